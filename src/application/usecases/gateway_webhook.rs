use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::usecases::ledger::{ApplyOutcome, SubscriptionLedgerUseCase};
use crate::application::usecases::payments::CardGateway;
use crate::application::usecases::{FlowError, UseCaseResult};
use crate::domain::entities::payment_attempts::{
    AttemptTransitionChanges, PaymentAttemptEntity,
};
use crate::domain::repositories::payment_attempts::PaymentAttemptRepository;
use crate::domain::value_objects::enums::{
    attempt_statuses::AttemptStatus, payment_rails::PaymentRail,
};
use crate::domain::value_objects::plans::PlanCatalog;
use crate::infrastructure::gateway::gateway_client::{GatewayClient, GatewayEvent};
use crate::notifications::{Notifier, PaymentNotification};

/// Ingests the card gateway's asynchronous confirmation callbacks. Signature
/// verification happens before anything is read or written; an unverifiable
/// callback leaves every attempt untouched.
pub struct GatewayWebhookUseCase {
    attempt_repo: Arc<dyn PaymentAttemptRepository + Send + Sync>,
    gateway: Arc<dyn CardGateway + Send + Sync>,
    ledger: Arc<SubscriptionLedgerUseCase>,
    catalog: Arc<PlanCatalog>,
    notifier: Notifier,
}

impl GatewayWebhookUseCase {
    pub fn new(
        attempt_repo: Arc<dyn PaymentAttemptRepository + Send + Sync>,
        gateway: Arc<dyn CardGateway + Send + Sync>,
        ledger: Arc<SubscriptionLedgerUseCase>,
        catalog: Arc<PlanCatalog>,
        notifier: Notifier,
    ) -> Self {
        Self {
            attempt_repo,
            gateway,
            ledger,
            catalog,
            notifier,
        }
    }

    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> UseCaseResult<()> {
        let event = self
            .gateway
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                // Malformed and unauthenticated callbacks get the same
                // response so the rejection itself leaks nothing.
                warn!(error = %err, "gateway webhook verification failed");
                FlowError::WebhookRejected
            })?;

        info!(event_type = %event.type_, event_id = ?event.id, "gateway webhook verified");

        match event.type_.as_str() {
            "payment.succeeded" => self.handle_succeeded(&event).await,
            "payment.failed" | "payment.canceled" => self.handle_unsuccessful(&event).await,
            _ => {
                debug!(event_type = %event.type_, "unhandled gateway event type");
                Ok(())
            }
        }
    }

    async fn handle_succeeded(&self, event: &GatewayEvent) -> UseCaseResult<()> {
        let attempt = self.load_attempt(event).await?;

        let status = parse_status(&attempt)?;
        if status == AttemptStatus::Confirmed {
            // Replay on a confirmed attempt: acknowledge, but still run the
            // per-attempt-idempotent apply so a crash between the confirm
            // and the credit heals on the gateway's retry.
            info!(
                attempt_id = %attempt.id,
                "gateway webhook replay on confirmed attempt, acknowledging"
            );
            self.ledger
                .apply_payment(attempt.account_id, attempt.plan_id, attempt.id)
                .await?;
            return Ok(());
        }

        let confirmed = self
            .attempt_repo
            .transition(
                attempt.id,
                AttemptStatus::AwaitingGatewayConfirmation,
                AttemptStatus::Confirmed,
                AttemptTransitionChanges::default(),
            )
            .await
            .map_err(|err| {
                error!(attempt_id = %attempt.id, db_error = ?err, "failed to confirm attempt");
                FlowError::Internal(err)
            })?;

        if !confirmed {
            // Lost the compare-and-set: either a replay confirmed it first
            // (acknowledge) or the attempt moved elsewhere (conflict).
            let current = self.reload_status(attempt.id).await?;
            if current == AttemptStatus::Confirmed {
                info!(
                    attempt_id = %attempt.id,
                    "concurrent replay already confirmed this attempt"
                );
                self.ledger
                    .apply_payment(attempt.account_id, attempt.plan_id, attempt.id)
                    .await?;
                return Ok(());
            }
            warn!(
                attempt_id = %attempt.id,
                status = %current,
                "succeeded callback raced a conflicting transition"
            );
            return Err(FlowError::StaleTransition);
        }

        let outcome = self
            .ledger
            .apply_payment(attempt.account_id, attempt.plan_id, attempt.id)
            .await?;

        if let ApplyOutcome::Applied { expiry_at } = outcome {
            let plan_name = self
                .catalog
                .find(attempt.plan_id)
                .map(|plan| plan.display_name.clone())
                .unwrap_or_default();

            self.notifier.try_notify(PaymentNotification::PaymentConfirmed {
                account_id: attempt.account_id,
                attempt_id: attempt.id,
                plan_name,
                expiry_at,
            });
        }

        info!(
            attempt_id = %attempt.id,
            account_id = %attempt.account_id,
            "gateway payment confirmed and credited"
        );

        Ok(())
    }

    async fn handle_unsuccessful(&self, event: &GatewayEvent) -> UseCaseResult<()> {
        let attempt = self.load_attempt(event).await?;

        let status = parse_status(&attempt)?;
        if status.is_terminal() {
            info!(
                attempt_id = %attempt.id,
                status = %status,
                "unsuccessful callback on terminal attempt, acknowledging"
            );
            return Ok(());
        }

        let failed = self
            .attempt_repo
            .transition(
                attempt.id,
                AttemptStatus::AwaitingGatewayConfirmation,
                AttemptStatus::Failed,
                AttemptTransitionChanges::default(),
            )
            .await
            .map_err(|err| {
                error!(attempt_id = %attempt.id, db_error = ?err, "failed to fail attempt");
                FlowError::Internal(err)
            })?;

        if !failed {
            let current = self.reload_status(attempt.id).await?;
            if current.is_terminal() {
                return Ok(());
            }
            warn!(
                attempt_id = %attempt.id,
                status = %current,
                "unsuccessful callback raced a conflicting transition"
            );
            return Err(FlowError::StaleTransition);
        }

        info!(
            attempt_id = %attempt.id,
            account_id = %attempt.account_id,
            "gateway payment failed, account may re-initiate"
        );

        Ok(())
    }

    async fn load_attempt(&self, event: &GatewayEvent) -> UseCaseResult<PaymentAttemptEntity> {
        let object = GatewayClient::extract_payment_object(event).ok_or_else(|| {
            warn!("gateway webhook payload missing payment object");
            FlowError::WebhookRejected
        })?;

        let attempt_id = object
            .reference
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| {
                warn!("gateway webhook payload missing attempt reference");
                FlowError::WebhookRejected
            })?;

        let attempt = self
            .attempt_repo
            .find_by_id(attempt_id)
            .await
            .map_err(|err| {
                error!(%attempt_id, db_error = ?err, "failed to load attempt for webhook");
                FlowError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%attempt_id, "gateway webhook references unknown attempt");
                FlowError::WebhookRejected
            })?;

        if PaymentRail::from_str(&attempt.rail) != Some(PaymentRail::Card) {
            warn!(%attempt_id, rail = %attempt.rail, "gateway webhook on non-card attempt");
            return Err(FlowError::WebhookRejected);
        }

        Ok(attempt)
    }

    async fn reload_status(&self, attempt_id: Uuid) -> UseCaseResult<AttemptStatus> {
        let attempt = self
            .attempt_repo
            .find_by_id(attempt_id)
            .await
            .map_err(FlowError::Internal)?
            .ok_or(FlowError::AttemptNotFound)?;
        parse_status(&attempt)
    }
}

fn parse_status(attempt: &PaymentAttemptEntity) -> UseCaseResult<AttemptStatus> {
    AttemptStatus::from_str(&attempt.status).ok_or_else(|| {
        FlowError::Internal(anyhow::anyhow!(
            "attempt {} carries unknown status {}",
            attempt.id,
            attempt.status
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::usecases::payments::MockCardGateway;
    use crate::domain::entities::subscriptions::SubscriptionEntity;
    use crate::domain::repositories::payment_attempts::MockPaymentAttemptRepository;
    use crate::domain::repositories::subscriptions::{
        CreateSubscriptionOutcome, MockSubscriptionRepository,
    };
    use crate::domain::value_objects::plans::{Plan, PlanFeatures};
    use crate::infrastructure::gateway::gateway_client::GatewayEventData;
    use chrono::Utc;
    use serde_json::json;

    fn catalog_with(plan_id: Uuid) -> Arc<PlanCatalog> {
        Arc::new(
            PlanCatalog::new(vec![Plan {
                id: plan_id,
                display_name: "Pro".to_string(),
                price_minor: 1000,
                currency: "usd".to_string(),
                period_days: 30,
                features: PlanFeatures::default(),
            }])
            .unwrap(),
        )
    }

    fn card_attempt(attempt_id: Uuid, account_id: Uuid, plan_id: Uuid, status: &str) -> PaymentAttemptEntity {
        PaymentAttemptEntity {
            id: attempt_id,
            account_id,
            plan_id,
            rail: "card".to_string(),
            amount_minor: 1000,
            currency: "usd".to_string(),
            status: status.to_string(),
            gateway_session_ref: Some("cs_1".to_string()),
            crypto_currency: None,
            receiving_address: None,
            transfer_reference: None,
            proof_ref: None,
            decided_by: None,
            decided_at: None,
            decision_note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn succeeded_event(attempt_id: Uuid) -> GatewayEvent {
        GatewayEvent {
            id: Some("evt_1".to_string()),
            type_: "payment.succeeded".to_string(),
            created: Some(1_700_000_000),
            data: GatewayEventData {
                object: json!({ "session": "cs_1", "reference": attempt_id.to_string() }),
            },
        }
    }

    fn gateway_returning(event: GatewayEvent) -> MockCardGateway {
        let mut gateway = MockCardGateway::new();
        let event = std::sync::Mutex::new(Some(event));
        gateway
            .expect_verify_webhook_signature()
            .times(1)
            .returning(move |_, _| {
                event
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| anyhow::anyhow!("event already consumed"))
            });
        gateway
    }

    fn usecase(
        attempt_repo: MockPaymentAttemptRepository,
        subscription_repo: MockSubscriptionRepository,
        gateway: MockCardGateway,
        plan_id: Uuid,
    ) -> GatewayWebhookUseCase {
        let catalog = catalog_with(plan_id);
        let ledger = Arc::new(SubscriptionLedgerUseCase::new(
            Arc::new(subscription_repo),
            Arc::clone(&catalog),
            Notifier::noop(),
        ));
        GatewayWebhookUseCase::new(
            Arc::new(attempt_repo),
            Arc::new(gateway),
            ledger,
            catalog,
            Notifier::noop(),
        )
    }

    #[tokio::test]
    async fn unverifiable_callback_changes_nothing() {
        let mut gateway = MockCardGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("invalid webhook signature")));

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(0);
        attempt_repo.expect_transition().times(0);

        let usecase = usecase(
            attempt_repo,
            MockSubscriptionRepository::new(),
            gateway,
            Uuid::new_v4(),
        );

        let result = usecase.handle_webhook(b"{}", "t=1,v1=bad").await;
        assert!(matches!(result, Err(FlowError::WebhookRejected)));
    }

    #[tokio::test]
    async fn verified_success_confirms_and_credits_once() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(1).returning(move |_| {
            Ok(Some(card_attempt(
                attempt_id,
                account_id,
                plan_id,
                "awaiting_gateway_confirmation",
            )))
        });
        attempt_repo
            .expect_transition()
            .withf(move |id, from, to, _| {
                *id == attempt_id
                    && *from == AttemptStatus::AwaitingGatewayConfirmation
                    && *to == AttemptStatus::Confirmed
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_account()
            .times(1)
            .returning(|_| Ok(None));
        subscription_repo
            .expect_create()
            .withf(move |insert| insert.last_applied_attempt_id == Some(attempt_id))
            .times(1)
            .returning(|_| Ok(CreateSubscriptionOutcome::Created));

        let usecase = usecase(
            attempt_repo,
            subscription_repo,
            gateway_returning(succeeded_event(attempt_id)),
            plan_id,
        );

        usecase.handle_webhook(b"{}", "t=1,v1=ok").await.unwrap();
    }

    #[tokio::test]
    async fn replayed_success_acknowledges_without_second_credit() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(1).returning(move |_| {
            Ok(Some(card_attempt(attempt_id, account_id, plan_id, "confirmed")))
        });
        attempt_repo.expect_transition().times(0);

        // The replay re-runs the idempotent apply: one read, no writes.
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_account()
            .times(1)
            .returning(move |_| {
                Ok(Some(SubscriptionEntity {
                    id: Uuid::new_v4(),
                    account_id,
                    plan_id,
                    status: "active".to_string(),
                    expiry_at: Utc::now() + chrono::Duration::days(30),
                    version: 2,
                    last_applied_attempt_id: Some(attempt_id),
                    expiry_notified_at: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                }))
            });
        subscription_repo.expect_update_versioned().times(0);
        subscription_repo.expect_create().times(0);

        let usecase = usecase(
            attempt_repo,
            subscription_repo,
            gateway_returning(succeeded_event(attempt_id)),
            plan_id,
        );

        usecase.handle_webhook(b"{}", "t=1,v1=ok").await.unwrap();
    }

    #[tokio::test]
    async fn losing_the_confirm_race_to_a_replay_still_acknowledges() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        let reads = std::sync::atomic::AtomicUsize::new(0);
        attempt_repo.expect_find_by_id().times(2).returning(move |_| {
            let status = if reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                "awaiting_gateway_confirmation"
            } else {
                "confirmed"
            };
            Ok(Some(card_attempt(attempt_id, account_id, plan_id, status)))
        });
        attempt_repo
            .expect_transition()
            .times(1)
            .returning(|_, _, _, _| Ok(false));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_account()
            .times(1)
            .returning(move |_| {
                Ok(Some(SubscriptionEntity {
                    id: Uuid::new_v4(),
                    account_id,
                    plan_id,
                    status: "active".to_string(),
                    expiry_at: Utc::now() + chrono::Duration::days(30),
                    version: 2,
                    last_applied_attempt_id: Some(attempt_id),
                    expiry_notified_at: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                }))
            });
        subscription_repo.expect_update_versioned().times(0);
        subscription_repo.expect_create().times(0);

        let usecase = usecase(
            attempt_repo,
            subscription_repo,
            gateway_returning(succeeded_event(attempt_id)),
            plan_id,
        );

        usecase.handle_webhook(b"{}", "t=1,v1=ok").await.unwrap();
    }

    #[tokio::test]
    async fn failed_callback_closes_the_attempt_without_credit() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(1).returning(move |_| {
            Ok(Some(card_attempt(
                attempt_id,
                account_id,
                plan_id,
                "awaiting_gateway_confirmation",
            )))
        });
        attempt_repo
            .expect_transition()
            .withf(move |id, from, to, _| {
                *id == attempt_id
                    && *from == AttemptStatus::AwaitingGatewayConfirmation
                    && *to == AttemptStatus::Failed
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_by_account().times(0);
        subscription_repo.expect_create().times(0);

        let mut event = succeeded_event(attempt_id);
        event.type_ = "payment.failed".to_string();

        let usecase = usecase(attempt_repo, subscription_repo, gateway_returning(event), plan_id);
        usecase.handle_webhook(b"{}", "t=1,v1=ok").await.unwrap();
    }

    #[tokio::test]
    async fn callback_without_attempt_reference_is_rejected() {
        let plan_id = Uuid::new_v4();

        let event = GatewayEvent {
            id: None,
            type_: "payment.succeeded".to_string(),
            created: None,
            data: GatewayEventData {
                object: json!({ "session": "cs_1" }),
            },
        };

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(0);

        let usecase = usecase(
            attempt_repo,
            MockSubscriptionRepository::new(),
            gateway_returning(event),
            plan_id,
        );

        let result = usecase.handle_webhook(b"{}", "t=1,v1=ok").await;
        assert!(matches!(result, Err(FlowError::WebhookRejected)));
    }

    #[tokio::test]
    async fn unhandled_event_types_are_ignored() {
        let mut event = succeeded_event(Uuid::new_v4());
        event.type_ = "payout.created".to_string();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(0);

        let usecase = usecase(
            attempt_repo,
            MockSubscriptionRepository::new(),
            gateway_returning(event),
            Uuid::new_v4(),
        );

        usecase.handle_webhook(b"{}", "t=1,v1=ok").await.unwrap();
    }
}
