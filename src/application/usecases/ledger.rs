use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::usecases::{FlowError, UseCaseResult};
use crate::domain::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionChanges};
use crate::domain::repositories::subscriptions::{
    CreateSubscriptionOutcome, SubscriptionRepository,
};
use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
use crate::domain::value_objects::plans::PlanCatalog;
use crate::domain::value_objects::subscriptions::CurrentSubscriptionDto;
use crate::notifications::{Notifier, PaymentNotification};

/// Bounded optimistic-concurrency retry budget for ledger writes.
const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, PartialEq)]
pub enum ApplyOutcome {
    Applied { expiry_at: DateTime<Utc> },
    AlreadyApplied,
}

/// The sole writer of subscription state. Both rails converge here: a
/// gateway confirmation and an admin approval both end in `apply_payment`,
/// serialized by the version counter on the subscription row.
pub struct SubscriptionLedgerUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    catalog: Arc<PlanCatalog>,
    notifier: Notifier,
}

impl SubscriptionLedgerUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        catalog: Arc<PlanCatalog>,
        notifier: Notifier,
    ) -> Self {
        Self {
            subscription_repo,
            catalog,
            notifier,
        }
    }

    /// Credits one successful payment attempt. Re-applying the attempt that
    /// was credited last is a no-op; the single-open-attempt invariant
    /// guarantees a replayed attempt id is always the most recent one, so
    /// tracking only the last applied id is sufficient.
    pub async fn apply_payment(
        &self,
        account_id: Uuid,
        plan_id: Uuid,
        attempt_id: Uuid,
    ) -> UseCaseResult<ApplyOutcome> {
        let plan = self.catalog.find(plan_id).ok_or_else(|| {
            warn!(%account_id, %plan_id, "ledger: plan missing from catalog");
            FlowError::PlanNotFound
        })?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let current = self
                .subscription_repo
                .find_by_account(account_id)
                .await
                .map_err(|err| {
                    error!(%account_id, db_error = ?err, "ledger: failed to read subscription");
                    FlowError::Internal(err)
                })?;

            match current {
                Some(subscription) => {
                    if subscription.last_applied_attempt_id == Some(attempt_id) {
                        info!(
                            %account_id,
                            %attempt_id,
                            "ledger: attempt already credited, skipping"
                        );
                        return Ok(ApplyOutcome::AlreadyApplied);
                    }

                    let now = Utc::now();
                    let expiry_at =
                        compute_new_expiry(now, Some(subscription.expiry_at), plan.period_days);

                    let changes = SubscriptionChanges {
                        plan_id: Some(plan_id),
                        status: Some(SubscriptionStatus::Active.to_string()),
                        expiry_at: Some(expiry_at),
                        last_applied_attempt_id: Some(attempt_id),
                        expiry_notified_at: Some(None),
                    };

                    let written = self
                        .subscription_repo
                        .update_versioned(account_id, subscription.version, changes)
                        .await
                        .map_err(|err| {
                            error!(
                                %account_id,
                                %attempt_id,
                                db_error = ?err,
                                "ledger: failed to write subscription"
                            );
                            FlowError::Internal(err)
                        })?;

                    if written {
                        info!(
                            %account_id,
                            %attempt_id,
                            %plan_id,
                            expiry_at = %expiry_at,
                            "ledger: payment applied"
                        );
                        return Ok(ApplyOutcome::Applied { expiry_at });
                    }

                    debug!(
                        %account_id,
                        version = subscription.version,
                        "ledger: version conflict, re-reading"
                    );
                }
                None => {
                    let now = Utc::now();
                    let expiry_at = compute_new_expiry(now, None, plan.period_days);

                    let outcome = self
                        .subscription_repo
                        .create(InsertSubscriptionEntity {
                            account_id,
                            plan_id,
                            status: SubscriptionStatus::Active.to_string(),
                            expiry_at,
                            version: 1,
                            last_applied_attempt_id: Some(attempt_id),
                        })
                        .await
                        .map_err(|err| {
                            error!(
                                %account_id,
                                %attempt_id,
                                db_error = ?err,
                                "ledger: failed to create subscription"
                            );
                            FlowError::Internal(err)
                        })?;

                    match outcome {
                        CreateSubscriptionOutcome::Created => {
                            info!(
                                %account_id,
                                %attempt_id,
                                %plan_id,
                                expiry_at = %expiry_at,
                                "ledger: subscription created on first payment"
                            );
                            return Ok(ApplyOutcome::Applied { expiry_at });
                        }
                        CreateSubscriptionOutcome::AccountRowExists => {
                            debug!(
                                %account_id,
                                "ledger: concurrent first payment, re-reading"
                            );
                        }
                    }
                }
            }
        }

        warn!(%account_id, %attempt_id, "ledger: write retry budget exhausted");
        Err(FlowError::ConcurrencyExhausted)
    }

    /// Admin adjustment: grants extra paid time on top of the remaining term.
    pub async fn extend(
        &self,
        account_id: Uuid,
        duration_days: i32,
    ) -> UseCaseResult<CurrentSubscriptionDto> {
        if duration_days <= 0 {
            return Err(FlowError::Validation(
                "duration_days must be positive".to_string(),
            ));
        }

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let subscription = self
                .subscription_repo
                .find_by_account(account_id)
                .await
                .map_err(|err| {
                    error!(%account_id, db_error = ?err, "ledger: failed to read subscription");
                    FlowError::Internal(err)
                })?
                .ok_or_else(|| {
                    warn!(%account_id, "ledger: extend on account without subscription");
                    FlowError::SubscriptionNotFound
                })?;

            let now = Utc::now();
            let expiry_at = compute_new_expiry(now, Some(subscription.expiry_at), duration_days);

            let changes = SubscriptionChanges {
                status: Some(SubscriptionStatus::Active.to_string()),
                expiry_at: Some(expiry_at),
                expiry_notified_at: Some(None),
                ..Default::default()
            };

            let written = self
                .subscription_repo
                .update_versioned(account_id, subscription.version, changes)
                .await
                .map_err(|err| {
                    error!(%account_id, db_error = ?err, "ledger: failed to extend subscription");
                    FlowError::Internal(err)
                })?;

            if written {
                info!(
                    %account_id,
                    duration_days,
                    expiry_at = %expiry_at,
                    "ledger: subscription extended"
                );
                let mut updated = subscription;
                updated.status = SubscriptionStatus::Active.to_string();
                updated.expiry_at = expiry_at;
                updated.version += 1;
                return Ok(CurrentSubscriptionDto::from_entity(updated, now));
            }

            debug!(%account_id, "ledger: version conflict on extend, re-reading");
        }

        warn!(%account_id, "ledger: extend retry budget exhausted");
        Err(FlowError::ConcurrencyExhausted)
    }

    /// Admin adjustment: forces the stored status.
    pub async fn set_status(
        &self,
        account_id: Uuid,
        status: SubscriptionStatus,
    ) -> UseCaseResult<()> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let subscription = self
                .subscription_repo
                .find_by_account(account_id)
                .await
                .map_err(|err| {
                    error!(%account_id, db_error = ?err, "ledger: failed to read subscription");
                    FlowError::Internal(err)
                })?
                .ok_or_else(|| {
                    warn!(%account_id, "ledger: set_status on account without subscription");
                    FlowError::SubscriptionNotFound
                })?;

            let changes = SubscriptionChanges {
                status: Some(status.to_string()),
                ..Default::default()
            };

            let written = self
                .subscription_repo
                .update_versioned(account_id, subscription.version, changes)
                .await
                .map_err(|err| {
                    error!(%account_id, db_error = ?err, "ledger: failed to set status");
                    FlowError::Internal(err)
                })?;

            if written {
                info!(%account_id, status = %status, "ledger: subscription status set");
                return Ok(());
            }

            debug!(%account_id, "ledger: version conflict on set_status, re-reading");
        }

        warn!(%account_id, "ledger: set_status retry budget exhausted");
        Err(FlowError::ConcurrencyExhausted)
    }

    /// Current subscription view. Whether access is granted is recomputed
    /// from `expiry_at` on every call; nothing here is cached.
    pub async fn current(&self, account_id: Uuid) -> UseCaseResult<Option<CurrentSubscriptionDto>> {
        let subscription = self
            .subscription_repo
            .find_by_account(account_id)
            .await
            .map_err(|err| {
                error!(%account_id, db_error = ?err, "ledger: failed to read subscription");
                FlowError::Internal(err)
            })?;

        Ok(subscription.map(|entity| CurrentSubscriptionDto::from_entity(entity, Utc::now())))
    }

    /// Emits one nearing-expiry notification per renewal cycle for
    /// subscriptions ending within the window. Lost version races are left
    /// for the next sweep tick.
    pub async fn send_expiry_reminders(&self, window_days: i64) -> UseCaseResult<usize> {
        let now = Utc::now();
        let window_end = now + Duration::days(window_days);

        let expiring = self
            .subscription_repo
            .list_unnotified_expiring(window_end)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "ledger: failed to list expiring subscriptions");
                FlowError::Internal(err)
            })?;

        let mut notified = 0;
        for subscription in expiring {
            if subscription.expiry_at <= now {
                continue;
            }

            let changes = SubscriptionChanges {
                expiry_notified_at: Some(Some(now)),
                ..Default::default()
            };

            let written = self
                .subscription_repo
                .update_versioned(subscription.account_id, subscription.version, changes)
                .await
                .map_err(|err| {
                    error!(
                        account_id = %subscription.account_id,
                        db_error = ?err,
                        "ledger: failed to mark expiry reminder"
                    );
                    FlowError::Internal(err)
                })?;

            if !written {
                debug!(
                    account_id = %subscription.account_id,
                    "ledger: reminder mark lost a version race, skipping"
                );
                continue;
            }

            self.notifier
                .try_notify(PaymentNotification::ExpiryApproaching {
                    account_id: subscription.account_id,
                    expiry_at: subscription.expiry_at,
                });
            notified += 1;
        }

        Ok(notified)
    }
}

/// New expiry after crediting `period_days`: a renewal before expiry extends
/// the remaining term instead of resetting it, and the result never moves
/// backwards.
pub fn compute_new_expiry(
    now: DateTime<Utc>,
    current_expiry: Option<DateTime<Utc>>,
    period_days: i32,
) -> DateTime<Utc> {
    let base = match current_expiry {
        Some(expiry) if expiry > now => expiry,
        _ => now,
    };
    base + Duration::days(period_days.into())
}
