use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use crate::domain::value_objects::plans::{PlanCatalog, PlanDto};
use crate::infrastructure::axum_http::auth::AuthAccount;

pub fn routes(catalog: Arc<PlanCatalog>) -> Router {
    Router::new()
        .route("/", get(list_plans))
        .with_state(catalog)
}

pub async fn list_plans(
    State(catalog): State<Arc<PlanCatalog>>,
    _auth: AuthAccount,
) -> impl IntoResponse {
    let plans: Vec<PlanDto> = catalog.plans().iter().map(PlanDto::from).collect();
    Json(plans)
}
