use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::notifier::{NotificationProvider, PaymentNotification};

/// Posts a short human-readable line to a chat-style webhook (Discord,
/// Slack-compatible) for the operators watching the review queue.
pub struct WebhookNotifyProvider {
    webhook_url: Url,
    client: Client,
}

impl WebhookNotifyProvider {
    pub fn new(webhook_url: Url) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(3))
            .build()
            .expect("reqwest client must build");

        Self {
            webhook_url,
            client,
        }
    }

    fn format_content(notification: &PaymentNotification) -> String {
        match notification {
            PaymentNotification::PaymentConfirmed {
                account_id,
                attempt_id,
                plan_name,
                expiry_at,
            } => format!(
                "payment confirmed: account `{}` plan `{}` attempt `{}`, paid through `{}`",
                account_id,
                plan_name,
                attempt_id,
                expiry_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            PaymentNotification::ProofApproved {
                account_id,
                attempt_id,
            } => format!(
                "crypto transfer approved: account `{}` attempt `{}`",
                account_id, attempt_id
            ),
            PaymentNotification::ProofRejected {
                account_id,
                attempt_id,
                note,
            } => format!(
                "crypto transfer rejected: account `{}` attempt `{}`{}",
                account_id,
                attempt_id,
                note.as_deref()
                    .map(|n| format!(" ({n})"))
                    .unwrap_or_default()
            ),
            PaymentNotification::ExpiryApproaching {
                account_id,
                expiry_at,
            } => format!(
                "subscription nearing expiry: account `{}` expires `{}`",
                account_id,
                expiry_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        }
    }
}

#[async_trait]
impl NotificationProvider for WebhookNotifyProvider {
    async fn send(&self, notification: &PaymentNotification) -> Result<()> {
        let content = Self::format_content(notification);

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "notify webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn provider_name(&self) -> &'static str {
        "webhook"
    }
}

fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("notify webhook request timed out");
    }
    if error.is_connect() {
        return anyhow!("notify webhook connection failed");
    }
    anyhow!("notify webhook request failed")
}
