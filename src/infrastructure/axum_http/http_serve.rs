use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::application::usecases::gateway_webhook::GatewayWebhookUseCase;
use crate::application::usecases::ledger::SubscriptionLedgerUseCase;
use crate::application::usecases::manual_review::ManualReviewUseCase;
use crate::application::usecases::payments::PaymentUseCase;
use crate::config::config_model::DotEnvyConfig;
use crate::domain::value_objects::plans::PlanCatalog;
use crate::infrastructure::axum_http::{default_routers, routers};

pub async fn start(
    config: Arc<DotEnvyConfig>,
    catalog: Arc<PlanCatalog>,
    payments: Arc<PaymentUseCase>,
    review: Arc<ManualReviewUseCase>,
    ledger: Arc<SubscriptionLedgerUseCase>,
    webhook: Arc<GatewayWebhookUseCase>,
) -> Result<()> {
    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1/plans", routers::plans::routes(catalog))
        .nest(
            "/api/v1/payments",
            routers::payments::routes(payments, Arc::clone(&review)),
        )
        .nest(
            "/api/v1/subscriptions",
            routers::subscriptions::routes(Arc::clone(&ledger)),
        )
        .nest("/api/v1/admin", routers::admin::routes(review, ledger))
        .nest("/webhooks/gateway", routers::gateway_webhook::routes(webhook))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout)))
        .layer(RequestBodyLimitLayer::new(
            (config.server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM signal handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
