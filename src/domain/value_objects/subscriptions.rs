use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;

/// Server-authoritative view of an account's subscription. `expiry_at` is the
/// single source of truth for paid access; `active` is recomputed from it on
/// every read and never cached. `version` lets a caller detect "nothing
/// changed" without refetching the whole row.
#[derive(Debug, Serialize)]
pub struct CurrentSubscriptionDto {
    pub account_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub expiry_at: DateTime<Utc>,
    pub active: bool,
    pub version: i64,
}

impl CurrentSubscriptionDto {
    pub fn from_entity(entity: SubscriptionEntity, now: DateTime<Utc>) -> Self {
        let status = SubscriptionStatus::from_str(&entity.status);

        Self {
            account_id: entity.account_id,
            plan_id: entity.plan_id,
            status,
            expiry_at: entity.expiry_at,
            active: status == SubscriptionStatus::Active && entity.expiry_at > now,
            version: entity.version,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendSubscriptionRequest {
    pub duration_days: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetSubscriptionStatusRequest {
    pub status: SubscriptionStatus,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub subscription: Option<CurrentSubscriptionDto>,
}
