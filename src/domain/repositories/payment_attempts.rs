use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_attempts::{
    AttemptTransitionChanges, InsertPaymentAttemptEntity, PaymentAttemptEntity,
};
use crate::domain::value_objects::enums::{
    attempt_statuses::AttemptStatus, payment_rails::PaymentRail,
};

/// Outcome of the conditional insert that enforces the single-open-attempt
/// invariant. `OpenAttemptExists` maps the partial unique index violation.
#[derive(Debug)]
pub enum CreateAttemptOutcome {
    Created,
    OpenAttemptExists,
}

#[automock]
#[async_trait]
pub trait PaymentAttemptRepository {
    async fn create(&self, attempt: InsertPaymentAttemptEntity) -> Result<CreateAttemptOutcome>;

    async fn find_by_id(&self, attempt_id: Uuid) -> Result<Option<PaymentAttemptEntity>>;

    async fn find_open_by_account(&self, account_id: Uuid)
    -> Result<Option<PaymentAttemptEntity>>;

    async fn find_latest_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Option<PaymentAttemptEntity>>;

    async fn list(
        &self,
        status: Option<AttemptStatus>,
        rail: Option<PaymentRail>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentAttemptEntity>>;

    /// Compare-and-set on `status`: the update only applies while the row is
    /// still in `from`. Returns false when the caller lost the race.
    async fn transition(
        &self,
        attempt_id: Uuid,
        from: AttemptStatus,
        to: AttemptStatus,
        changes: AttemptTransitionChanges,
    ) -> Result<bool>;

    /// Open attempts in a sweepable status created before `cutoff`.
    async fn list_stale_open(&self, cutoff: DateTime<Utc>)
    -> Result<Vec<PaymentAttemptEntity>>;
}
