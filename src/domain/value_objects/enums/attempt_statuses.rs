use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a payment attempt. Card attempts move
/// `Initiated -> AwaitingGatewayConfirmation -> Confirmed | Failed`,
/// crypto attempts move
/// `Initiated -> AwaitingProof -> PendingReview -> Approved | Rejected`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Initiated,
    AwaitingGatewayConfirmation,
    AwaitingProof,
    PendingReview,
    Confirmed,
    Failed,
    Approved,
    Rejected,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Initiated => "initiated",
            AttemptStatus::AwaitingGatewayConfirmation => "awaiting_gateway_confirmation",
            AttemptStatus::AwaitingProof => "awaiting_proof",
            AttemptStatus::PendingReview => "pending_review",
            AttemptStatus::Confirmed => "confirmed",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Approved => "approved",
            AttemptStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "initiated" => Some(AttemptStatus::Initiated),
            "awaiting_gateway_confirmation" => Some(AttemptStatus::AwaitingGatewayConfirmation),
            "awaiting_proof" => Some(AttemptStatus::AwaitingProof),
            "pending_review" => Some(AttemptStatus::PendingReview),
            "confirmed" => Some(AttemptStatus::Confirmed),
            "failed" => Some(AttemptStatus::Failed),
            "approved" => Some(AttemptStatus::Approved),
            "rejected" => Some(AttemptStatus::Rejected),
            _ => None,
        }
    }

    /// No transition is defined out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptStatus::Confirmed
                | AttemptStatus::Failed
                | AttemptStatus::Approved
                | AttemptStatus::Rejected
        )
    }

    /// Statuses eligible for the staleness sweep: the attempt is open but
    /// nothing external (gateway callback, admin decision) is pending on it.
    pub fn is_sweepable(&self) -> bool {
        matches!(
            self,
            AttemptStatus::Initiated | AttemptStatus::AwaitingProof
        )
    }
}

impl Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
