use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::subscriptions;

/// The single authoritative subscription record per account. `version` is a
/// monotonic counter incremented on every write; all writers condition their
/// update on the version they read.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub account_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub expiry_at: DateTime<Utc>,
    pub version: i64,
    pub last_applied_attempt_id: Option<Uuid>,
    pub expiry_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub account_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub expiry_at: DateTime<Utc>,
    pub version: i64,
    pub last_applied_attempt_id: Option<Uuid>,
}

/// Versioned update payload. Outer `None` skips the column; the nested
/// `Option` on `expiry_notified_at` allows writing NULL back.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionChanges {
    pub plan_id: Option<Uuid>,
    pub status: Option<String>,
    pub expiry_at: Option<DateTime<Utc>>,
    pub last_applied_attempt_id: Option<Uuid>,
    pub expiry_notified_at: Option<Option<DateTime<Utc>>>,
}
