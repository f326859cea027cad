mod notifier;
mod webhook;

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

pub use notifier::{NotificationProvider, Notifier, PaymentNotification};
pub use webhook::WebhookNotifyProvider;

/// Builds the dispatcher from the environment. A missing or invalid
/// `NOTIFY_WEBHOOK_URL` disables the sink without failing startup; the URL is
/// never logged because it carries a secret.
pub fn notifier_from_env() -> Notifier {
    let raw = std::env::var("NOTIFY_WEBHOOK_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());

    let provider: Option<Arc<dyn NotificationProvider>> = match raw.as_deref() {
        Some(raw) => match Url::parse(raw) {
            Ok(url) => Some(Arc::new(WebhookNotifyProvider::new(url))),
            Err(err) => {
                warn!(
                    parse_error = %err,
                    "NOTIFY_WEBHOOK_URL is set but invalid; notifications disabled"
                );
                None
            }
        },
        None => None,
    };

    match provider {
        Some(provider) => {
            info!("Notification webhook enabled");
            Notifier::new(vec![provider])
        }
        None => {
            info!("Notification webhook disabled");
            Notifier::noop()
        }
    }
}
