pub mod gateway_webhook;
pub mod ledger;
pub mod manual_review;
pub mod payments;

use thiserror::Error;

/// Error taxonomy shared by the payment and subscription usecases. Conflict
/// variants mean the caller raced another writer or acted on stale state and
/// must re-read before retrying; the system never retries on their behalf.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("plan not found")]
    PlanNotFound,

    #[error("payment attempt not found")]
    AttemptNotFound,

    #[error("no subscription exists for this account")]
    SubscriptionNotFound,

    #[error("an open payment attempt already exists for this account")]
    AttemptAlreadyOpen,

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("operation not allowed in the attempt's current state: {0}")]
    InvalidState(String),

    #[error("attempt has already been decided")]
    AlreadyDecided,

    #[error("attempt was modified concurrently")]
    StaleTransition,

    #[error("payment gateway is unavailable")]
    GatewayUnavailable,

    #[error("webhook rejected")]
    WebhookRejected,

    #[error("subscription is being updated concurrently, retry shortly")]
    ConcurrencyExhausted,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FlowError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            FlowError::PlanNotFound
            | FlowError::AttemptNotFound
            | FlowError::SubscriptionNotFound => StatusCode::NOT_FOUND,
            FlowError::Validation(_) | FlowError::WebhookRejected => StatusCode::BAD_REQUEST,
            FlowError::AttemptAlreadyOpen
            | FlowError::InvalidState(_)
            | FlowError::AlreadyDecided
            | FlowError::StaleTransition => StatusCode::CONFLICT,
            FlowError::GatewayUnavailable => StatusCode::BAD_GATEWAY,
            FlowError::ConcurrencyExhausted => StatusCode::SERVICE_UNAVAILABLE,
            FlowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, FlowError>;
