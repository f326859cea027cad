use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use subrail::application::usecases::gateway_webhook::GatewayWebhookUseCase;
use subrail::application::usecases::ledger::SubscriptionLedgerUseCase;
use subrail::application::usecases::manual_review::ManualReviewUseCase;
use subrail::application::usecases::payments::{CardGateway, PaymentUseCase};
use subrail::background_worker::sweep;
use subrail::config::config_loader;
use subrail::domain::repositories::payment_attempts::PaymentAttemptRepository;
use subrail::domain::repositories::proof_storage::ProofStorageClient;
use subrail::domain::repositories::subscriptions::SubscriptionRepository;
use subrail::domain::value_objects::plans::PlanCatalog;
use subrail::infrastructure::axum_http::http_serve;
use subrail::infrastructure::gateway::gateway_client::GatewayClient;
use subrail::infrastructure::postgres::postgres_connection;
use subrail::infrastructure::postgres::repositories::payment_attempts::PaymentAttemptPostgres;
use subrail::infrastructure::postgres::repositories::subscriptions::SubscriptionPostgres;
use subrail::infrastructure::storages::proof_store::S3ProofStorageClient;
use subrail::notifications;
use subrail::observability;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    observability::init_observability("subrail")?;

    let dotenvy_env = Arc::new(config_loader::load()?);
    info!("ENV has been loaded");

    let catalog_raw = std::fs::read_to_string(&dotenvy_env.plan_catalog.path)
        .with_context(|| format!("failed to read {}", dotenvy_env.plan_catalog.path))?;
    let catalog = Arc::new(PlanCatalog::from_json(&catalog_raw)?);
    info!(plan_count = catalog.plans().len(), "Plan catalog loaded");

    let postgres_pool = Arc::new(postgres_connection::establish_connection(
        &dotenvy_env.database.url,
    )?);
    info!("Postgres connection has been established");

    let notifier = notifications::notifier_from_env();

    let attempt_repo: Arc<dyn PaymentAttemptRepository + Send + Sync> =
        Arc::new(PaymentAttemptPostgres::new(Arc::clone(&postgres_pool)));
    let subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync> =
        Arc::new(SubscriptionPostgres::new(Arc::clone(&postgres_pool)));
    let proof_storage: Arc<dyn ProofStorageClient + Send + Sync> = Arc::new(
        S3ProofStorageClient::new(dotenvy_env.proof_storage.clone()).await?,
    );
    let gateway: Arc<dyn CardGateway + Send + Sync> =
        Arc::new(GatewayClient::new(&dotenvy_env.gateway));

    let ledger = Arc::new(SubscriptionLedgerUseCase::new(
        Arc::clone(&subscription_repo),
        Arc::clone(&catalog),
        notifier.clone(),
    ));
    let payments = Arc::new(PaymentUseCase::new(
        Arc::clone(&attempt_repo),
        Arc::clone(&gateway),
        Arc::clone(&catalog),
        dotenvy_env.gateway.clone(),
        dotenvy_env.crypto.clone(),
    ));
    let review = Arc::new(ManualReviewUseCase::new(
        Arc::clone(&attempt_repo),
        proof_storage,
        Arc::clone(&ledger),
        notifier.clone(),
        dotenvy_env.crypto.clone(),
    ));
    let webhook = Arc::new(GatewayWebhookUseCase::new(
        attempt_repo,
        gateway,
        Arc::clone(&ledger),
        Arc::clone(&catalog),
        notifier,
    ));

    let sweep_loop = tokio::spawn(sweep::run_sweep_loop(
        Arc::clone(&review),
        Arc::clone(&ledger),
        dotenvy_env.sweep.clone(),
    ));

    let http_server = tokio::spawn(http_serve::start(
        Arc::clone(&dotenvy_env),
        catalog,
        payments,
        review,
        ledger,
        webhook,
    ));

    tokio::select! {
        result = sweep_loop => result??,
        result = http_server => result??,
    };

    Ok(())
}
