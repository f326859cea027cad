use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{
    InsertSubscriptionEntity, SubscriptionChanges, SubscriptionEntity,
};

/// Outcome of the first-payment insert. `AccountRowExists` signals a
/// concurrent writer created the row first; the caller re-reads and retries
/// as a versioned update.
#[derive(Debug)]
pub enum CreateSubscriptionOutcome {
    Created,
    AccountRowExists,
}

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_account(&self, account_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn create(
        &self,
        subscription: InsertSubscriptionEntity,
    ) -> Result<CreateSubscriptionOutcome>;

    /// Optimistic-concurrency write: applies `changes` and bumps `version`
    /// only while the row still carries `expected_version`. Returns false on
    /// a lost race.
    async fn update_versioned(
        &self,
        account_id: Uuid,
        expected_version: i64,
        changes: SubscriptionChanges,
    ) -> Result<bool>;

    /// Active subscriptions expiring before `window_end` that have not been
    /// reminded since their last renewal.
    async fn list_unnotified_expiring(
        &self,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionEntity>>;
}
