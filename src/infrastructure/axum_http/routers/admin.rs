use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::application::usecases::UseCaseResult;
use crate::application::usecases::ledger::SubscriptionLedgerUseCase;
use crate::application::usecases::manual_review::ManualReviewUseCase;
use crate::domain::value_objects::payment_attempts::{AdminDecision, AttemptListFilter};
use crate::domain::value_objects::subscriptions::{
    ExtendSubscriptionRequest, SetSubscriptionStatusRequest,
};
use crate::infrastructure::axum_http::auth::AuthAdmin;

#[derive(Clone)]
pub struct AdminRouterState {
    pub review: Arc<ManualReviewUseCase>,
    pub ledger: Arc<SubscriptionLedgerUseCase>,
}

pub fn routes(review: Arc<ManualReviewUseCase>, ledger: Arc<SubscriptionLedgerUseCase>) -> Router {
    Router::new()
        .route("/payments", get(list_attempts))
        .route("/payments/:attempt_id/decide", post(decide))
        .route("/subscriptions/:account_id/extend", post(extend))
        .route("/subscriptions/:account_id/status", post(set_status))
        .with_state(AdminRouterState { review, ledger })
}

pub async fn list_attempts(
    State(state): State<AdminRouterState>,
    _auth: AuthAdmin,
    Query(filter): Query<AttemptListFilter>,
) -> UseCaseResult<impl IntoResponse> {
    let page = state.review.list_attempts(filter).await?;
    Ok(Json(page))
}

pub async fn decide(
    State(state): State<AdminRouterState>,
    auth: AuthAdmin,
    Path(attempt_id): Path<Uuid>,
    Json(decision): Json<AdminDecision>,
) -> UseCaseResult<impl IntoResponse> {
    let attempt = state
        .review
        .decide(auth.admin_id, attempt_id, decision)
        .await?;
    Ok(Json(attempt))
}

pub async fn extend(
    State(state): State<AdminRouterState>,
    _auth: AuthAdmin,
    Path(account_id): Path<Uuid>,
    Json(request): Json<ExtendSubscriptionRequest>,
) -> UseCaseResult<impl IntoResponse> {
    let subscription = state
        .ledger
        .extend(account_id, request.duration_days)
        .await?;
    Ok(Json(subscription))
}

pub async fn set_status(
    State(state): State<AdminRouterState>,
    _auth: AuthAdmin,
    Path(account_id): Path<Uuid>,
    Json(request): Json<SetSubscriptionStatusRequest>,
) -> UseCaseResult<impl IntoResponse> {
    state.ledger.set_status(account_id, request.status).await?;
    Ok(StatusCode::NO_CONTENT)
}
