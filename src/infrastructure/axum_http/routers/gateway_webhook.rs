use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};

use crate::application::usecases::gateway_webhook::GatewayWebhookUseCase;
use crate::application::usecases::{FlowError, UseCaseResult};

pub const SIGNATURE_HEADER: &str = "gateway-signature";

pub fn routes(usecase: Arc<GatewayWebhookUseCase>) -> Router {
    Router::new()
        .route("/", post(handle_gateway_webhook))
        .with_state(usecase)
}

/// Unauthenticated endpoint: the HMAC signature header is the only
/// credential, and verification happens before any state is touched.
pub async fn handle_gateway_webhook(
    State(usecase): State<Arc<GatewayWebhookUseCase>>,
    headers: HeaderMap,
    body: Bytes,
) -> UseCaseResult<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(FlowError::WebhookRejected)?;

    usecase.handle_webhook(&body, signature).await?;

    Ok(StatusCode::OK)
}
