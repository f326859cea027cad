use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::application::usecases::manual_review::ManualReviewUseCase;
use crate::application::usecases::payments::PaymentUseCase;
use crate::application::usecases::{FlowError, UseCaseResult};
use crate::domain::value_objects::payment_attempts::InitiatePaymentRequest;
use crate::infrastructure::axum_http::auth::AuthAccount;

#[derive(Clone)]
pub struct PaymentsRouterState {
    pub payments: Arc<PaymentUseCase>,
    pub review: Arc<ManualReviewUseCase>,
}

pub fn routes(payments: Arc<PaymentUseCase>, review: Arc<ManualReviewUseCase>) -> Router {
    Router::new()
        .route("/initiate", post(initiate))
        .route("/current", get(current_attempt))
        .route("/:attempt_id/proof", post(submit_proof))
        .with_state(PaymentsRouterState { payments, review })
}

pub async fn initiate(
    State(state): State<PaymentsRouterState>,
    auth: AuthAccount,
    Json(request): Json<InitiatePaymentRequest>,
) -> UseCaseResult<impl IntoResponse> {
    let instructions = state.payments.initiate(auth.account_id, request).await?;
    Ok((StatusCode::CREATED, Json(instructions)))
}

pub async fn current_attempt(
    State(state): State<PaymentsRouterState>,
    auth: AuthAccount,
) -> UseCaseResult<impl IntoResponse> {
    let attempt = state.payments.current_attempt(auth.account_id).await?;
    Ok(Json(attempt))
}

/// Multipart proof upload for the caller's own crypto attempt. The accepted
/// content types and the size ceiling are enforced in the usecase; the
/// request body limit layer bounds the raw upload before it gets here.
pub async fn submit_proof(
    State(state): State<PaymentsRouterState>,
    auth: AuthAccount,
    Path(attempt_id): Path<Uuid>,
    mut multipart: Multipart,
) -> UseCaseResult<impl IntoResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| FlowError::Validation(format!("invalid multipart payload: {err}")))?
    {
        if field.name() != Some("proof") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| {
                FlowError::Validation("proof field is missing a content type".to_string())
            })?;

        let bytes = field
            .bytes()
            .await
            .map_err(|err| FlowError::Validation(format!("failed to read proof upload: {err}")))?;

        state
            .review
            .submit_proof(auth.account_id, attempt_id, &content_type, bytes.to_vec())
            .await?;

        return Ok(StatusCode::ACCEPTED);
    }

    Err(FlowError::Validation(
        "multipart field 'proof' is required".to_string(),
    ))
}
