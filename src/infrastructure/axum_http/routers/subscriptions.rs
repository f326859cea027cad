use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use crate::application::usecases::UseCaseResult;
use crate::application::usecases::ledger::SubscriptionLedgerUseCase;
use crate::domain::value_objects::subscriptions::SubscriptionView;
use crate::infrastructure::axum_http::auth::AuthAccount;

pub fn routes(ledger: Arc<SubscriptionLedgerUseCase>) -> Router {
    Router::new()
        .route("/current", get(current_subscription))
        .with_state(ledger)
}

pub async fn current_subscription(
    State(ledger): State<Arc<SubscriptionLedgerUseCase>>,
    auth: AuthAccount,
) -> UseCaseResult<impl IntoResponse> {
    let subscription = ledger.current(auth.account_id).await?;
    Ok(Json(SubscriptionView { subscription }))
}
