use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::usecases::ledger::{ApplyOutcome, SubscriptionLedgerUseCase};
use crate::application::usecases::{FlowError, UseCaseResult};
use crate::config::config_model::CryptoRailConfig;
use crate::domain::entities::payment_attempts::AttemptTransitionChanges;
use crate::domain::repositories::payment_attempts::PaymentAttemptRepository;
use crate::domain::repositories::proof_storage::ProofStorageClient;
use crate::domain::value_objects::enums::{
    attempt_statuses::AttemptStatus, decision_actions::DecisionAction, payment_rails::PaymentRail,
};
use crate::domain::value_objects::payment_attempts::{
    AdminDecision, AttemptListFilter, AttemptListPage, PaymentAttemptDto,
};
use crate::notifications::{Notifier, PaymentNotification};

const ALLOWED_PROOF_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "application/pdf"];

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Crypto-rail attempts waiting on caller evidence and on an admin decision.
/// Every path out of `PendingReview` goes through the same compare-and-set,
/// so a human decision and the staleness sweep can never both win.
pub struct ManualReviewUseCase {
    attempt_repo: Arc<dyn PaymentAttemptRepository + Send + Sync>,
    proof_storage: Arc<dyn ProofStorageClient + Send + Sync>,
    ledger: Arc<SubscriptionLedgerUseCase>,
    notifier: Notifier,
    crypto_config: CryptoRailConfig,
}

impl ManualReviewUseCase {
    pub fn new(
        attempt_repo: Arc<dyn PaymentAttemptRepository + Send + Sync>,
        proof_storage: Arc<dyn ProofStorageClient + Send + Sync>,
        ledger: Arc<SubscriptionLedgerUseCase>,
        notifier: Notifier,
        crypto_config: CryptoRailConfig,
    ) -> Self {
        Self {
            attempt_repo,
            proof_storage,
            ledger,
            notifier,
            crypto_config,
        }
    }

    /// Attaches proof-of-transfer evidence to the caller's own attempt and
    /// queues it for review. Evidence is attached exactly once; a retried
    /// upload after the first lands with `InvalidState` instead of silently
    /// replacing what the reviewer will look at.
    pub async fn submit_proof(
        &self,
        account_id: Uuid,
        attempt_id: Uuid,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> UseCaseResult<()> {
        let attempt = self
            .attempt_repo
            .find_by_id(attempt_id)
            .await
            .map_err(|err| {
                error!(%attempt_id, db_error = ?err, "review: failed to load attempt");
                FlowError::Internal(err)
            })?
            .ok_or(FlowError::AttemptNotFound)?;

        // Attempt ids are unguessable, but ownership is still enforced; a
        // foreign attempt looks like a missing one.
        if attempt.account_id != account_id {
            warn!(
                %attempt_id,
                %account_id,
                owner = %attempt.account_id,
                "review: proof submitted for an attempt the caller does not own"
            );
            return Err(FlowError::AttemptNotFound);
        }

        if PaymentRail::from_str(&attempt.rail) != Some(PaymentRail::Crypto) {
            return Err(FlowError::InvalidState(
                "proof can only be attached to crypto attempts".to_string(),
            ));
        }

        if !ALLOWED_PROOF_CONTENT_TYPES.contains(&content_type) {
            return Err(FlowError::Validation(format!(
                "unsupported proof content type: {content_type}"
            )));
        }
        if bytes.is_empty() {
            return Err(FlowError::Validation("proof upload is empty".to_string()));
        }
        if bytes.len() > self.crypto_config.proof_max_bytes {
            return Err(FlowError::Validation(format!(
                "proof upload exceeds the {} byte limit",
                self.crypto_config.proof_max_bytes
            )));
        }

        let status = parse_status(&attempt.status, attempt_id)?;
        if status != AttemptStatus::AwaitingProof {
            return Err(FlowError::InvalidState(
                "attempt is not awaiting proof".to_string(),
            ));
        }

        // Storage write happens before the transition and fails closed: a
        // timed-out upload leaves the attempt in AwaitingProof.
        let proof_ref = self
            .proof_storage
            .upload_proof(attempt_id, bytes, content_type)
            .await
            .map_err(|err| {
                error!(%attempt_id, error = ?err, "review: proof upload failed");
                FlowError::Internal(err)
            })?;

        let queued = self
            .attempt_repo
            .transition(
                attempt_id,
                AttemptStatus::AwaitingProof,
                AttemptStatus::PendingReview,
                AttemptTransitionChanges {
                    proof_ref: Some(proof_ref),
                    ..Default::default()
                },
            )
            .await
            .map_err(|err| {
                error!(%attempt_id, db_error = ?err, "review: failed to queue attempt");
                FlowError::Internal(err)
            })?;

        if !queued {
            warn!(%attempt_id, "review: concurrent proof submission lost the race");
            return Err(FlowError::InvalidState(
                "proof was already submitted for this attempt".to_string(),
            ));
        }

        info!(%attempt_id, %account_id, "review: proof attached, pending review");
        Ok(())
    }

    /// Applies an admin decision to a `PendingReview` attempt. Terminal and
    /// idempotent under replay: the losing side of a decision race (another
    /// admin or the sweep) gets `AlreadyDecided`, never a second credit.
    pub async fn decide(
        &self,
        admin_id: Uuid,
        attempt_id: Uuid,
        decision: AdminDecision,
    ) -> UseCaseResult<PaymentAttemptDto> {
        let attempt = self
            .attempt_repo
            .find_by_id(attempt_id)
            .await
            .map_err(|err| {
                error!(%attempt_id, db_error = ?err, "review: failed to load attempt");
                FlowError::Internal(err)
            })?
            .ok_or(FlowError::AttemptNotFound)?;

        if PaymentRail::from_str(&attempt.rail) != Some(PaymentRail::Crypto) {
            return Err(FlowError::InvalidState(
                "only crypto attempts are decided manually".to_string(),
            ));
        }

        let status = parse_status(&attempt.status, attempt_id)?;
        if status.is_terminal() {
            return Err(FlowError::AlreadyDecided);
        }
        if status != AttemptStatus::PendingReview {
            return Err(FlowError::InvalidState(
                "attempt is not awaiting review".to_string(),
            ));
        }

        let to = match decision.action {
            DecisionAction::Approve => AttemptStatus::Approved,
            DecisionAction::Reject => AttemptStatus::Rejected,
        };

        let decided = self
            .attempt_repo
            .transition(
                attempt_id,
                AttemptStatus::PendingReview,
                to,
                AttemptTransitionChanges {
                    decided_by: Some(admin_id),
                    decided_at: Some(Utc::now()),
                    decision_note: decision.note.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|err| {
                error!(%attempt_id, db_error = ?err, "review: failed to record decision");
                FlowError::Internal(err)
            })?;

        if !decided {
            let current = self
                .attempt_repo
                .find_by_id(attempt_id)
                .await
                .map_err(FlowError::Internal)?
                .ok_or(FlowError::AttemptNotFound)?;
            let current_status = parse_status(&current.status, attempt_id)?;
            if current_status.is_terminal() {
                warn!(
                    %attempt_id,
                    %admin_id,
                    status = %current_status,
                    "review: decision lost the race to another decision"
                );
                return Err(FlowError::AlreadyDecided);
            }
            return Err(FlowError::StaleTransition);
        }

        info!(
            %attempt_id,
            %admin_id,
            action = %decision.action,
            "review: attempt decided"
        );

        match decision.action {
            DecisionAction::Approve => {
                let outcome = self
                    .ledger
                    .apply_payment(attempt.account_id, attempt.plan_id, attempt.id)
                    .await?;
                if matches!(outcome, ApplyOutcome::Applied { .. }) {
                    self.notifier.try_notify(PaymentNotification::ProofApproved {
                        account_id: attempt.account_id,
                        attempt_id: attempt.id,
                    });
                }
            }
            DecisionAction::Reject => {
                self.notifier.try_notify(PaymentNotification::ProofRejected {
                    account_id: attempt.account_id,
                    attempt_id: attempt.id,
                    note: decision.note,
                });
            }
        }

        let decided_attempt = self
            .attempt_repo
            .find_by_id(attempt_id)
            .await
            .map_err(FlowError::Internal)?
            .ok_or(FlowError::AttemptNotFound)?;

        Ok(PaymentAttemptDto::from(decided_attempt))
    }

    /// Paged attempt listing for the admin review surface.
    pub async fn list_attempts(&self, filter: AttemptListFilter) -> UseCaseResult<AttemptListPage> {
        let page = filter.page.unwrap_or(0).max(0);
        let page_size = filter
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let attempts = self
            .attempt_repo
            .list(filter.status, filter.rail, page_size, page * page_size)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "review: failed to list attempts");
                FlowError::Internal(err)
            })?;

        Ok(AttemptListPage {
            attempts: attempts.into_iter().map(PaymentAttemptDto::from).collect(),
            page,
            page_size,
        })
    }

    /// Rejects attempts abandoned in `Initiated` or `AwaitingProof` past the
    /// configured window, freeing the account to initiate again. Runs on the
    /// decision transition path, so a concurrent human decision simply wins.
    pub async fn sweep_stale_attempts(&self) -> UseCaseResult<usize> {
        let cutoff = Utc::now() - Duration::hours(self.crypto_config.stale_after_hours);

        let stale = self
            .attempt_repo
            .list_stale_open(cutoff)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "sweep: failed to list stale attempts");
                FlowError::Internal(err)
            })?;

        let mut swept = 0;
        for attempt in stale {
            let status = match AttemptStatus::from_str(&attempt.status) {
                Some(status) if status.is_sweepable() => status,
                _ => continue,
            };

            let rejected = self
                .attempt_repo
                .transition(
                    attempt.id,
                    status,
                    AttemptStatus::Rejected,
                    AttemptTransitionChanges {
                        decided_at: Some(Utc::now()),
                        decision_note: Some(
                            "auto-rejected: attempt exceeded the verification window".to_string(),
                        ),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|err| {
                    error!(
                        attempt_id = %attempt.id,
                        db_error = ?err,
                        "sweep: failed to reject stale attempt"
                    );
                    FlowError::Internal(err)
                })?;

            if rejected {
                info!(
                    attempt_id = %attempt.id,
                    account_id = %attempt.account_id,
                    "sweep: stale attempt auto-rejected"
                );
                swept += 1;
            } else {
                debug!(
                    attempt_id = %attempt.id,
                    "sweep: attempt moved on before the sweep reached it"
                );
            }
        }

        Ok(swept)
    }
}

fn parse_status(raw: &str, attempt_id: Uuid) -> UseCaseResult<AttemptStatus> {
    AttemptStatus::from_str(raw).ok_or_else(|| {
        FlowError::Internal(anyhow::anyhow!(
            "attempt {attempt_id} carries unknown status {raw}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::payment_attempts::PaymentAttemptEntity;
    use crate::domain::repositories::payment_attempts::MockPaymentAttemptRepository;
    use crate::domain::repositories::proof_storage::MockProofStorageClient;
    use crate::domain::repositories::subscriptions::MockSubscriptionRepository;
    use crate::domain::value_objects::plans::{Plan, PlanCatalog, PlanFeatures};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn crypto_config() -> CryptoRailConfig {
        CryptoRailConfig {
            enabled: true,
            currency: "usdt-trc20".to_string(),
            receiving_address: "TTestReceivingAddress123".to_string(),
            stale_after_hours: 48,
            proof_max_bytes: 1024,
        }
    }

    fn crypto_attempt(
        attempt_id: Uuid,
        account_id: Uuid,
        plan_id: Uuid,
        status: &str,
    ) -> PaymentAttemptEntity {
        PaymentAttemptEntity {
            id: attempt_id,
            account_id,
            plan_id,
            rail: "crypto".to_string(),
            amount_minor: 1000,
            currency: "usd".to_string(),
            status: status.to_string(),
            gateway_session_ref: None,
            crypto_currency: Some("usdt-trc20".to_string()),
            receiving_address: Some("TTestReceivingAddress123".to_string()),
            transfer_reference: Some("REF1234567".to_string()),
            proof_ref: None,
            decided_by: None,
            decided_at: None,
            decision_note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn usecase(
        attempt_repo: MockPaymentAttemptRepository,
        proof_storage: MockProofStorageClient,
        subscription_repo: MockSubscriptionRepository,
        plan_id: Uuid,
    ) -> ManualReviewUseCase {
        let catalog = Arc::new(
            PlanCatalog::new(vec![Plan {
                id: plan_id,
                display_name: "Pro".to_string(),
                price_minor: 1000,
                currency: "usd".to_string(),
                period_days: 30,
                features: PlanFeatures::default(),
            }])
            .unwrap(),
        );
        let ledger = Arc::new(SubscriptionLedgerUseCase::new(
            Arc::new(subscription_repo),
            catalog,
            Notifier::noop(),
        ));
        ManualReviewUseCase::new(
            Arc::new(attempt_repo),
            Arc::new(proof_storage),
            ledger,
            Notifier::noop(),
            crypto_config(),
        )
    }

    #[tokio::test]
    async fn proof_submission_uploads_then_queues_for_review() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(1).returning(move |_| {
            Ok(Some(crypto_attempt(
                attempt_id,
                account_id,
                plan_id,
                "awaiting_proof",
            )))
        });
        attempt_repo
            .expect_transition()
            .withf(move |id, from, to, changes| {
                *id == attempt_id
                    && *from == AttemptStatus::AwaitingProof
                    && *to == AttemptStatus::PendingReview
                    && changes.proof_ref.as_deref() == Some("proofs/obj-1.jpg")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let mut proof_storage = MockProofStorageClient::new();
        proof_storage
            .expect_upload_proof()
            .times(1)
            .returning(|_, _, _| Ok("proofs/obj-1.jpg".to_string()));

        let usecase = usecase(
            attempt_repo,
            proof_storage,
            MockSubscriptionRepository::new(),
            plan_id,
        );

        usecase
            .submit_proof(account_id, attempt_id, "image/jpeg", vec![1, 2, 3])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn foreign_attempt_looks_like_a_missing_one() {
        let attempt_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(1).returning(move |_| {
            Ok(Some(crypto_attempt(
                attempt_id,
                Uuid::new_v4(),
                plan_id,
                "awaiting_proof",
            )))
        });

        let mut proof_storage = MockProofStorageClient::new();
        proof_storage.expect_upload_proof().times(0);

        let usecase = usecase(
            attempt_repo,
            proof_storage,
            MockSubscriptionRepository::new(),
            plan_id,
        );

        let result = usecase
            .submit_proof(Uuid::new_v4(), attempt_id, "image/jpeg", vec![1])
            .await;
        assert!(matches!(result, Err(FlowError::AttemptNotFound)));
    }

    #[tokio::test]
    async fn second_submission_is_rejected_not_overwritten() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(1).returning(move |_| {
            Ok(Some(crypto_attempt(
                attempt_id,
                account_id,
                plan_id,
                "pending_review",
            )))
        });
        attempt_repo.expect_transition().times(0);

        let mut proof_storage = MockProofStorageClient::new();
        proof_storage.expect_upload_proof().times(0);

        let usecase = usecase(
            attempt_repo,
            proof_storage,
            MockSubscriptionRepository::new(),
            plan_id,
        );

        let result = usecase
            .submit_proof(account_id, attempt_id, "image/jpeg", vec![1])
            .await;
        assert!(matches!(result, Err(FlowError::InvalidState(_))));
    }

    #[tokio::test]
    async fn oversize_and_unsupported_uploads_are_rejected_by_policy() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(2).returning(move |_| {
            Ok(Some(crypto_attempt(
                attempt_id,
                account_id,
                plan_id,
                "awaiting_proof",
            )))
        });

        let mut proof_storage = MockProofStorageClient::new();
        proof_storage.expect_upload_proof().times(0);

        let usecase = usecase(
            attempt_repo,
            proof_storage,
            MockSubscriptionRepository::new(),
            plan_id,
        );

        let oversize = vec![0u8; 2048];
        let result = usecase
            .submit_proof(account_id, attempt_id, "image/jpeg", oversize)
            .await;
        assert!(matches!(result, Err(FlowError::Validation(_))));

        let result = usecase
            .submit_proof(account_id, attempt_id, "text/html", vec![1])
            .await;
        assert!(matches!(result, Err(FlowError::Validation(_))));
    }

    #[tokio::test]
    async fn failed_upload_leaves_the_attempt_awaiting_proof() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(1).returning(move |_| {
            Ok(Some(crypto_attempt(
                attempt_id,
                account_id,
                plan_id,
                "awaiting_proof",
            )))
        });
        attempt_repo.expect_transition().times(0);

        let mut proof_storage = MockProofStorageClient::new();
        proof_storage
            .expect_upload_proof()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("storage write timed out")));

        let usecase = usecase(
            attempt_repo,
            proof_storage,
            MockSubscriptionRepository::new(),
            plan_id,
        );

        let result = usecase
            .submit_proof(account_id, attempt_id, "image/png", vec![1])
            .await;
        assert!(matches!(result, Err(FlowError::Internal(_))));
    }

    #[tokio::test]
    async fn approval_credits_the_ledger_exactly_once() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();
        let admin_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        let reads = AtomicUsize::new(0);
        attempt_repo.expect_find_by_id().times(2).returning(move |_| {
            let status = if reads.fetch_add(1, Ordering::SeqCst) == 0 {
                "pending_review"
            } else {
                "approved"
            };
            Ok(Some(crypto_attempt(attempt_id, account_id, plan_id, status)))
        });
        attempt_repo
            .expect_transition()
            .withf(move |id, from, to, changes| {
                *id == attempt_id
                    && *from == AttemptStatus::PendingReview
                    && *to == AttemptStatus::Approved
                    && changes.decided_by == Some(admin_id)
                    && changes.decided_at.is_some()
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
            .returning(|_| {
                Ok(crate::domain::repositories::subscriptions::CreateSubscriptionOutcome::Created)
            });

        let usecase = usecase(
            attempt_repo,
            MockProofStorageClient::new(),
            subscription_repo,
            plan_id,
        );

        let dto = usecase
            .decide(
                admin_id,
                attempt_id,
                AdminDecision {
                    action: DecisionAction::Approve,
                    note: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(dto.status, Some(AttemptStatus::Approved));
    }

    #[tokio::test]
    async fn rejection_never_touches_the_ledger() {
        let attempt_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        let reads = AtomicUsize::new(0);
        attempt_repo.expect_find_by_id().times(2).returning(move |_| {
            let status = if reads.fetch_add(1, Ordering::SeqCst) == 0 {
                "pending_review"
            } else {
                "rejected"
            };
            Ok(Some(crypto_attempt(attempt_id, account_id, plan_id, status)))
        });
        attempt_repo
            .expect_transition()
            .withf(|_, _, to, changes| {
                *to == AttemptStatus::Rejected
                    && changes.decision_note.as_deref() == Some("amount does not match")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_by_account().times(0);
        subscription_repo.expect_create().times(0);
        subscription_repo.expect_update_versioned().times(0);

        let usecase = usecase(
            attempt_repo,
            MockProofStorageClient::new(),
            subscription_repo,
            plan_id,
        );

        let dto = usecase
            .decide(
                Uuid::new_v4(),
                attempt_id,
                AdminDecision {
                    action: DecisionAction::Reject,
                    note: Some("amount does not match".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(dto.status, Some(AttemptStatus::Rejected));
    }

    #[tokio::test]
    async fn deciding_a_decided_attempt_fails_with_already_decided() {
        let attempt_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_find_by_id().times(1).returning(move |_| {
            Ok(Some(crypto_attempt(
                attempt_id,
                Uuid::new_v4(),
                plan_id,
                "approved",
            )))
        });
        attempt_repo.expect_transition().times(0);

        let usecase = usecase(
            attempt_repo,
            MockProofStorageClient::new(),
            MockSubscriptionRepository::new(),
            plan_id,
        );

        let result = usecase
            .decide(
                Uuid::new_v4(),
                attempt_id,
                AdminDecision {
                    action: DecisionAction::Reject,
                    note: None,
                },
            )
            .await;
        assert!(matches!(result, Err(FlowError::AlreadyDecided)));
    }

    #[tokio::test]
    async fn simultaneous_decisions_yield_one_winner() {
        let attempt_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        let reads = AtomicUsize::new(0);
        attempt_repo.expect_find_by_id().times(2).returning(move |_| {
            let status = if reads.fetch_add(1, Ordering::SeqCst) == 0 {
                // What this admin saw before racing the other decision.
                "pending_review"
            } else {
                "rejected"
            };
            Ok(Some(crypto_attempt(
                attempt_id,
                Uuid::new_v4(),
                plan_id,
                status,
            )))
        });
        attempt_repo
            .expect_transition()
            .times(1)
            .returning(|_, _, _, _| Ok(false));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_by_account().times(0);
        subscription_repo.expect_create().times(0);

        let usecase = usecase(
            attempt_repo,
            MockProofStorageClient::new(),
            subscription_repo,
            plan_id,
        );

        let result = usecase
            .decide(
                Uuid::new_v4(),
                attempt_id,
                AdminDecision {
                    action: DecisionAction::Approve,
                    note: None,
                },
            )
            .await;
        assert!(matches!(result, Err(FlowError::AlreadyDecided)));
    }

    #[tokio::test]
    async fn sweep_rejects_stale_attempts_and_skips_racing_ones() {
        let plan_id = Uuid::new_v4();
        let stale_id = Uuid::new_v4();
        let racing_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo.expect_list_stale_open().times(1).returning(move |_| {
            Ok(vec![
                crypto_attempt(stale_id, Uuid::new_v4(), plan_id, "awaiting_proof"),
                crypto_attempt(racing_id, Uuid::new_v4(), plan_id, "awaiting_proof"),
            ])
        });
        attempt_repo
            .expect_transition()
            .withf(|_, from, to, changes| {
                *from == AttemptStatus::AwaitingProof
                    && *to == AttemptStatus::Rejected
                    && changes.decision_note.is_some()
                    && changes.decided_by.is_none()
            })
            .times(2)
            .returning(move |id, _, _, _| Ok(id == stale_id));

        let usecase = usecase(
            attempt_repo,
            MockProofStorageClient::new(),
            MockSubscriptionRepository::new(),
            plan_id,
        );

        let swept = usecase.sweep_stale_attempts().await.unwrap();
        assert_eq!(swept, 1);
    }

    #[tokio::test]
    async fn listing_clamps_paging_and_maps_rows() {
        let plan_id = Uuid::new_v4();

        let mut attempt_repo = MockPaymentAttemptRepository::new();
        attempt_repo
            .expect_list()
            .withf(|status, rail, limit, offset| {
                *status == Some(AttemptStatus::PendingReview)
                    && *rail == Some(PaymentRail::Crypto)
                    && *limit == MAX_PAGE_SIZE
                    && *offset == MAX_PAGE_SIZE
            })
            .times(1)
            .returning(move |_, _, _, _| {
                Ok(vec![crypto_attempt(
                    Uuid::new_v4(),
                    Uuid::new_v4(),
                    plan_id,
                    "pending_review",
                )])
            });

        let usecase = usecase(
            attempt_repo,
            MockProofStorageClient::new(),
            MockSubscriptionRepository::new(),
            plan_id,
        );

        let page = usecase
            .list_attempts(AttemptListFilter {
                status: Some(AttemptStatus::PendingReview),
                rail: Some(PaymentRail::Crypto),
                page: Some(1),
                page_size: Some(500),
            })
            .await
            .unwrap();

        assert_eq!(page.attempts.len(), 1);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
    }
}
