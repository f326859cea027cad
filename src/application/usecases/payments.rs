use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use rand::Rng;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::usecases::{FlowError, UseCaseResult};
use crate::config::config_model::{CryptoRailConfig, GatewayRailConfig};
use crate::domain::entities::payment_attempts::{
    AttemptTransitionChanges, InsertPaymentAttemptEntity,
};
use crate::domain::repositories::payment_attempts::{
    CreateAttemptOutcome, PaymentAttemptRepository,
};
use crate::domain::value_objects::enums::{
    attempt_statuses::AttemptStatus, payment_rails::PaymentRail,
};
use crate::domain::value_objects::payment_attempts::{
    InitiatePaymentRequest, PaymentAttemptDto, PaymentInstructions,
};
use crate::domain::value_objects::plans::{Plan, PlanCatalog};
use crate::infrastructure::gateway::gateway_client::{
    GatewayCheckoutSession, GatewayClient, GatewayEvent,
};

/// Seam over the external card gateway so the payment flow can be exercised
/// without network access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        attempt_id: Uuid,
        amount_minor: i32,
        currency: &str,
        description: &str,
    ) -> AnyResult<GatewayCheckoutSession>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<GatewayEvent>;
}

#[async_trait]
impl CardGateway for GatewayClient {
    async fn create_checkout_session(
        &self,
        attempt_id: Uuid,
        amount_minor: i32,
        currency: &str,
        description: &str,
    ) -> AnyResult<GatewayCheckoutSession> {
        self.create_checkout_session(attempt_id, amount_minor, currency, description)
            .await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<GatewayEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}

/// Owns the open/closed lifecycle of payment attempts: initiation on either
/// rail and the caller-facing status view. At most one attempt per account is
/// ever in a non-terminal status; the attempt table's conditional insert is
/// the authoritative guard.
pub struct PaymentUseCase {
    attempt_repo: Arc<dyn PaymentAttemptRepository + Send + Sync>,
    gateway: Arc<dyn CardGateway + Send + Sync>,
    catalog: Arc<PlanCatalog>,
    gateway_config: GatewayRailConfig,
    crypto_config: CryptoRailConfig,
}

impl PaymentUseCase {
    pub fn new(
        attempt_repo: Arc<dyn PaymentAttemptRepository + Send + Sync>,
        gateway: Arc<dyn CardGateway + Send + Sync>,
        catalog: Arc<PlanCatalog>,
        gateway_config: GatewayRailConfig,
        crypto_config: CryptoRailConfig,
    ) -> Self {
        Self {
            attempt_repo,
            gateway,
            catalog,
            gateway_config,
            crypto_config,
        }
    }

    pub async fn initiate(
        &self,
        account_id: Uuid,
        request: InitiatePaymentRequest,
    ) -> UseCaseResult<PaymentInstructions> {
        let plan = self.catalog.find(request.plan_id).ok_or_else(|| {
            warn!(%account_id, plan_id = %request.plan_id, "payments: unknown plan requested");
            FlowError::PlanNotFound
        })?;

        // Fast-fail before talking to the gateway; the insert below remains
        // the authoritative check.
        let open = self
            .attempt_repo
            .find_open_by_account(account_id)
            .await
            .map_err(|err| {
                error!(%account_id, db_error = ?err, "payments: failed to check open attempts");
                FlowError::Internal(err)
            })?;
        if let Some(existing) = open {
            warn!(
                %account_id,
                open_attempt_id = %existing.id,
                "payments: initiation while an attempt is still open"
            );
            return Err(FlowError::AttemptAlreadyOpen);
        }

        match request.rail {
            PaymentRail::Card => self.initiate_card(account_id, plan).await,
            PaymentRail::Crypto => self.initiate_crypto(account_id, plan).await,
        }
    }

    async fn initiate_card(
        &self,
        account_id: Uuid,
        plan: &Plan,
    ) -> UseCaseResult<PaymentInstructions> {
        if !self.gateway_config.enabled {
            return Err(FlowError::Validation(
                "card payments are currently disabled".to_string(),
            ));
        }

        let attempt_id = Uuid::new_v4();

        // Session first, row second: if the gateway is down no attempt row
        // ever exists, keeping initiation all-or-nothing.
        let session = self
            .gateway
            .create_checkout_session(
                attempt_id,
                plan.price_minor,
                &plan.currency,
                &plan.display_name,
            )
            .await
            .map_err(|err| {
                error!(
                    %account_id,
                    plan_id = %plan.id,
                    error = ?err,
                    "payments: gateway session creation failed"
                );
                FlowError::GatewayUnavailable
            })?;

        self.insert_attempt(
            InsertPaymentAttemptEntity {
                id: attempt_id,
                account_id,
                plan_id: plan.id,
                rail: PaymentRail::Card.to_string(),
                amount_minor: plan.price_minor,
                currency: plan.currency.clone(),
                status: AttemptStatus::Initiated.to_string(),
                gateway_session_ref: Some(session.session_ref.clone()),
                crypto_currency: None,
                receiving_address: None,
                transfer_reference: None,
            },
            AttemptStatus::AwaitingGatewayConfirmation,
        )
        .await?;

        info!(
            %account_id,
            %attempt_id,
            plan_id = %plan.id,
            session_ref = %session.session_ref,
            "payments: card attempt initiated"
        );

        Ok(PaymentInstructions::Card {
            attempt_id,
            checkout_url: session.checkout_url,
        })
    }

    async fn initiate_crypto(
        &self,
        account_id: Uuid,
        plan: &Plan,
    ) -> UseCaseResult<PaymentInstructions> {
        if !self.crypto_config.enabled {
            return Err(FlowError::Validation(
                "crypto payments are currently disabled".to_string(),
            ));
        }

        let attempt_id = Uuid::new_v4();
        let transfer_reference = generate_transfer_reference();

        self.insert_attempt(
            InsertPaymentAttemptEntity {
                id: attempt_id,
                account_id,
                plan_id: plan.id,
                rail: PaymentRail::Crypto.to_string(),
                amount_minor: plan.price_minor,
                currency: plan.currency.clone(),
                status: AttemptStatus::Initiated.to_string(),
                gateway_session_ref: None,
                crypto_currency: Some(self.crypto_config.currency.clone()),
                receiving_address: Some(self.crypto_config.receiving_address.clone()),
                transfer_reference: Some(transfer_reference.clone()),
            },
            AttemptStatus::AwaitingProof,
        )
        .await?;

        info!(
            %account_id,
            %attempt_id,
            plan_id = %plan.id,
            "payments: crypto attempt initiated, awaiting proof"
        );

        Ok(PaymentInstructions::Crypto {
            attempt_id,
            crypto_currency: self.crypto_config.currency.clone(),
            receiving_address: self.crypto_config.receiving_address.clone(),
            amount_minor: plan.price_minor,
            currency: plan.currency.clone(),
            transfer_reference,
        })
    }

    async fn insert_attempt(
        &self,
        insert: InsertPaymentAttemptEntity,
        handed_off: AttemptStatus,
    ) -> UseCaseResult<()> {
        let attempt_id = insert.id;
        let account_id = insert.account_id;

        let outcome = self.attempt_repo.create(insert).await.map_err(|err| {
            error!(%account_id, db_error = ?err, "payments: failed to persist attempt");
            FlowError::Internal(err)
        })?;

        if let CreateAttemptOutcome::OpenAttemptExists = outcome {
            warn!(
                %account_id,
                "payments: concurrent initiation lost to an existing open attempt"
            );
            return Err(FlowError::AttemptAlreadyOpen);
        }

        let handed = self
            .attempt_repo
            .transition(
                attempt_id,
                AttemptStatus::Initiated,
                handed_off,
                AttemptTransitionChanges::default(),
            )
            .await
            .map_err(|err| {
                error!(%attempt_id, db_error = ?err, "payments: failed to hand off attempt");
                FlowError::Internal(err)
            })?;

        if !handed {
            error!(%attempt_id, "payments: freshly created attempt left Initiated unexpectedly");
            return Err(FlowError::Internal(anyhow::anyhow!(
                "attempt {attempt_id} could not be handed off"
            )));
        }

        Ok(())
    }

    /// The account's most recent attempt, terminal or not. Always served
    /// fresh so a caller can see a rejected or failed attempt and initiate
    /// again.
    pub async fn current_attempt(
        &self,
        account_id: Uuid,
    ) -> UseCaseResult<Option<PaymentAttemptDto>> {
        let attempt = self
            .attempt_repo
            .find_latest_by_account(account_id)
            .await
            .map_err(|err| {
                error!(%account_id, db_error = ?err, "payments: failed to load latest attempt");
                FlowError::Internal(err)
            })?;

        Ok(attempt.map(PaymentAttemptDto::from))
    }
}

/// Short code the payer includes in the transfer memo so a reviewer can match
/// the on-chain transfer to the attempt.
fn generate_transfer_reference() -> String {
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect::<String>()
        .to_ascii_uppercase()
}
