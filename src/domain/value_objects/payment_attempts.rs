use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::payment_attempts::PaymentAttemptEntity;
use crate::domain::value_objects::enums::{
    attempt_statuses::AttemptStatus, decision_actions::DecisionAction, payment_rails::PaymentRail,
};

#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePaymentRequest {
    pub plan_id: Uuid,
    pub rail: PaymentRail,
}

/// Rail-specific instructions handed back from `initiate`.
#[derive(Debug, Serialize)]
#[serde(tag = "rail", rename_all = "lowercase")]
pub enum PaymentInstructions {
    Card {
        attempt_id: Uuid,
        checkout_url: String,
    },
    Crypto {
        attempt_id: Uuid,
        crypto_currency: String,
        receiving_address: String,
        amount_minor: i32,
        currency: String,
        transfer_reference: String,
    },
}

impl PaymentInstructions {
    pub fn attempt_id(&self) -> Uuid {
        match self {
            PaymentInstructions::Card { attempt_id, .. } => *attempt_id,
            PaymentInstructions::Crypto { attempt_id, .. } => *attempt_id,
        }
    }
}

/// Ephemeral admin command; recorded onto the attempt it decides, never
/// persisted on its own.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminDecision {
    pub action: DecisionAction,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AttemptListFilter {
    pub status: Option<AttemptStatus>,
    pub rail: Option<PaymentRail>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaymentAttemptDto {
    pub attempt_id: Uuid,
    pub account_id: Uuid,
    pub plan_id: Uuid,
    pub rail: Option<PaymentRail>,
    pub amount_minor: i32,
    pub currency: String,
    pub status: Option<AttemptStatus>,
    pub terminal: bool,
    pub proof_submitted: bool,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentAttemptEntity> for PaymentAttemptDto {
    fn from(entity: PaymentAttemptEntity) -> Self {
        let status = AttemptStatus::from_str(&entity.status);

        Self {
            attempt_id: entity.id,
            account_id: entity.account_id,
            plan_id: entity.plan_id,
            rail: PaymentRail::from_str(&entity.rail),
            amount_minor: entity.amount_minor,
            currency: entity.currency,
            status,
            terminal: status.map(|s| s.is_terminal()).unwrap_or(false),
            proof_submitted: entity.proof_ref.is_some(),
            decided_by: entity.decided_by,
            decided_at: entity.decided_at,
            decision_note: entity.decision_note,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttemptListPage {
    pub attempts: Vec<PaymentAttemptDto>,
    pub page: i64,
    pub page_size: i64,
}
