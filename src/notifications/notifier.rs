use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Terminal-state and expiry events pushed to external sinks. Fire and
/// forget: a dropped notification never blocks or fails the transition that
/// produced it.
#[derive(Clone, Debug)]
pub enum PaymentNotification {
    PaymentConfirmed {
        account_id: Uuid,
        attempt_id: Uuid,
        plan_name: String,
        expiry_at: DateTime<Utc>,
    },
    ProofApproved {
        account_id: Uuid,
        attempt_id: Uuid,
    },
    ProofRejected {
        account_id: Uuid,
        attempt_id: Uuid,
        note: Option<String>,
    },
    ExpiryApproaching {
        account_id: Uuid,
        expiry_at: DateTime<Utc>,
    },
}

#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send(&self, notification: &PaymentNotification) -> Result<()>;
    fn provider_name(&self) -> &'static str;
}

#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<PaymentNotification>,
}

impl Notifier {
    pub fn new(providers: Vec<Arc<dyn NotificationProvider>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<PaymentNotification>(256);

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                for provider in &providers {
                    if let Err(error) = provider.send(&notification).await {
                        warn!(
                            provider = provider.provider_name(),
                            error = %error,
                            "Notification provider failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    /// A notifier with no sinks; events are drained and dropped.
    pub fn noop() -> Self {
        Self::new(Vec::new())
    }

    pub fn try_notify(&self, notification: PaymentNotification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Notification queue full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Notification queue closed; dropping event");
            }
        }
    }
}
