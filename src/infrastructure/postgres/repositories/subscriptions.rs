use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{
    InsertSubscriptionEntity, SubscriptionChanges, SubscriptionEntity,
};
use crate::domain::repositories::subscriptions::{
    CreateSubscriptionOutcome, SubscriptionRepository,
};
use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
use crate::infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_account(&self, account_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = subscriptions::table
            .filter(subscriptions::account_id.eq(account_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    /// The unique index on `account_id` turns a concurrent first payment into
    /// a reported outcome so the ledger can fall back to a versioned update.
    async fn create(
        &self,
        subscription: InsertSubscriptionEntity,
    ) -> Result<CreateSubscriptionOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(subscriptions::table)
            .values(&subscription)
            .execute(&mut conn);

        match result {
            Ok(_) => Ok(CreateSubscriptionOutcome::Created),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Ok(CreateSubscriptionOutcome::AccountRowExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_versioned(
        &self,
        account_id: Uuid,
        expected_version: i64,
        changes: SubscriptionChanges,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(subscriptions::table)
            .filter(subscriptions::account_id.eq(account_id))
            .filter(subscriptions::version.eq(expected_version))
            .set((
                subscriptions::version.eq(expected_version + 1),
                subscriptions::updated_at.eq(Utc::now()),
                changes,
            ))
            .execute(&mut conn)?;

        Ok(affected == 1)
    }

    async fn list_unnotified_expiring(
        &self,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let expiring = subscriptions::table
            .filter(subscriptions::status.eq(SubscriptionStatus::Active.to_string()))
            .filter(subscriptions::expiry_at.le(window_end))
            .filter(subscriptions::expiry_notified_at.is_null())
            .select(SubscriptionEntity::as_select())
            .load::<SubscriptionEntity>(&mut conn)?;

        Ok(expiring)
    }
}
