use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tracing::{error, info};

use crate::application::usecases::ledger::SubscriptionLedgerUseCase;
use crate::application::usecases::manual_review::ManualReviewUseCase;
use crate::config::config_model::SweepConfig;

/// Single-writer periodic task: rejects attempts stuck past the verification
/// window and dispatches nearing-expiry reminders. Every write goes through
/// the same compare-and-set paths as the request handlers, so a tick can
/// never clobber a concurrent decision.
pub async fn run_sweep_loop(
    review: Arc<ManualReviewUseCase>,
    ledger: Arc<SubscriptionLedgerUseCase>,
    config: SweepConfig,
) -> Result<()> {
    info!(
        interval_secs = config.interval_secs,
        "Starting staleness sweep loop"
    );

    loop {
        match review.sweep_stale_attempts().await {
            Ok(0) => {}
            Ok(swept) => info!(swept, "Sweep rejected stale attempts"),
            Err(e) => error!("Error while sweeping stale attempts: {}", e),
        }

        match ledger
            .send_expiry_reminders(config.expiry_reminder_days)
            .await
        {
            Ok(0) => {}
            Ok(notified) => info!(notified, "Expiry reminders dispatched"),
            Err(e) => error!("Error while dispatching expiry reminders: {}", e),
        }

        tokio::time::sleep(Duration::from_secs(config.interval_secs)).await;
    }
}
