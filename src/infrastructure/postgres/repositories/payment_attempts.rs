use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entities::payment_attempts::{
    AttemptTransitionChanges, InsertPaymentAttemptEntity, PaymentAttemptEntity,
};
use crate::domain::repositories::payment_attempts::{
    CreateAttemptOutcome, PaymentAttemptRepository,
};
use crate::domain::value_objects::enums::{
    attempt_statuses::AttemptStatus, payment_rails::PaymentRail,
};
use crate::infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::payment_attempts};

pub struct PaymentAttemptPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentAttemptPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn non_terminal_statuses() -> Vec<String> {
    [
        AttemptStatus::Initiated,
        AttemptStatus::AwaitingGatewayConfirmation,
        AttemptStatus::AwaitingProof,
        AttemptStatus::PendingReview,
    ]
    .iter()
    .map(|status| status.to_string())
    .collect()
}

fn sweepable_statuses() -> Vec<String> {
    [AttemptStatus::Initiated, AttemptStatus::AwaitingProof]
        .iter()
        .map(|status| status.to_string())
        .collect()
}

#[async_trait]
impl PaymentAttemptRepository for PaymentAttemptPostgres {
    /// The partial unique index over open attempts makes this insert the
    /// authoritative single-open-attempt check; a violation is reported as
    /// an outcome, not an error.
    async fn create(&self, attempt: InsertPaymentAttemptEntity) -> Result<CreateAttemptOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(payment_attempts::table)
            .values(&attempt)
            .execute(&mut conn);

        match result {
            Ok(_) => Ok(CreateAttemptOutcome::Created),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Ok(CreateAttemptOutcome::OpenAttemptExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, attempt_id: Uuid) -> Result<Option<PaymentAttemptEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let attempt = payment_attempts::table
            .filter(payment_attempts::id.eq(attempt_id))
            .select(PaymentAttemptEntity::as_select())
            .first::<PaymentAttemptEntity>(&mut conn)
            .optional()?;

        Ok(attempt)
    }

    async fn find_open_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Option<PaymentAttemptEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let attempt = payment_attempts::table
            .filter(payment_attempts::account_id.eq(account_id))
            .filter(payment_attempts::status.eq_any(non_terminal_statuses()))
            .select(PaymentAttemptEntity::as_select())
            .first::<PaymentAttemptEntity>(&mut conn)
            .optional()?;

        Ok(attempt)
    }

    async fn find_latest_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Option<PaymentAttemptEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let attempt = payment_attempts::table
            .filter(payment_attempts::account_id.eq(account_id))
            .order(payment_attempts::created_at.desc())
            .select(PaymentAttemptEntity::as_select())
            .first::<PaymentAttemptEntity>(&mut conn)
            .optional()?;

        Ok(attempt)
    }

    async fn list(
        &self,
        status: Option<AttemptStatus>,
        rail: Option<PaymentRail>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentAttemptEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = payment_attempts::table
            .select(PaymentAttemptEntity::as_select())
            .into_boxed();

        if let Some(status) = status {
            query = query.filter(payment_attempts::status.eq(status.to_string()));
        }
        if let Some(rail) = rail {
            query = query.filter(payment_attempts::rail.eq(rail.to_string()));
        }

        let attempts = query
            .order(payment_attempts::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load::<PaymentAttemptEntity>(&mut conn)?;

        Ok(attempts)
    }

    async fn transition(
        &self,
        attempt_id: Uuid,
        from: AttemptStatus,
        to: AttemptStatus,
        changes: AttemptTransitionChanges,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(payment_attempts::table)
            .filter(payment_attempts::id.eq(attempt_id))
            .filter(payment_attempts::status.eq(from.to_string()))
            .set((
                payment_attempts::status.eq(to.to_string()),
                payment_attempts::updated_at.eq(Utc::now()),
                changes,
            ))
            .execute(&mut conn)?;

        Ok(affected == 1)
    }

    async fn list_stale_open(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PaymentAttemptEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let attempts = payment_attempts::table
            .filter(payment_attempts::status.eq_any(sweepable_statuses()))
            .filter(payment_attempts::created_at.lt(cutoff))
            .select(PaymentAttemptEntity::as_select())
            .load::<PaymentAttemptEntity>(&mut conn)?;

        Ok(attempts)
    }
}
