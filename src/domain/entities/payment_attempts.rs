use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::payment_attempts;

/// One row per payment initiation. Rows are never deleted; terminal attempts
/// stay behind as the audit trail.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_attempts)]
pub struct PaymentAttemptEntity {
    pub id: Uuid,
    pub account_id: Uuid,
    pub plan_id: Uuid,
    pub rail: String,
    pub amount_minor: i32,
    pub currency: String,
    pub status: String,
    pub gateway_session_ref: Option<String>,
    pub crypto_currency: Option<String>,
    pub receiving_address: Option<String>,
    pub transfer_reference: Option<String>,
    pub proof_ref: Option<String>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The attempt id is generated by the caller (it is embedded in gateway
/// session metadata before the row exists), so inserts carry it explicitly.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_attempts)]
pub struct InsertPaymentAttemptEntity {
    pub id: Uuid,
    pub account_id: Uuid,
    pub plan_id: Uuid,
    pub rail: String,
    pub amount_minor: i32,
    pub currency: String,
    pub status: String,
    pub gateway_session_ref: Option<String>,
    pub crypto_currency: Option<String>,
    pub receiving_address: Option<String>,
    pub transfer_reference: Option<String>,
}

/// Fields written alongside a status transition. `None` fields are left
/// untouched by the update.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = payment_attempts)]
pub struct AttemptTransitionChanges {
    pub proof_ref: Option<String>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
}
