//! Subscription lifecycle management.
//!
//! The manager reads a user's subscription, classifies plan changes against
//! the current catalog, and commits them through the store's
//! compare-and-set. A lost race surfaces as
//! [`BillingError::ConcurrentModification`]; the manager never retries on
//! its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BillingConfig;
use crate::error::Result;

use super::audit::{BillingAuditEvent, BillingAuditLogger, NoOpAuditLogger};
use super::charge::{ChargeOutcome, ChargeProcessor};
use super::classification::{self, Classification, TransitionKind, apply_due_downgrade, next_subscription};
use super::clock::{Clock, SystemClock};
use super::error::BillingError;
use super::governance::{TierTransition, validate_transition};
use super::plans::{FREE_PLAN_ID, Plan, Plans, WalkAllowance};
use super::proration::proration_delta;
use super::storage::{PlanFilter, PlanStore, StoredSubscription, SubscriptionStore};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Subscription lifecycle operations.
pub struct SubscriptionManager<S, K = SystemClock, A = NoOpAuditLogger> {
    store: S,
    clock: K,
    audit: A,
    expiring_soon_days: u32,
}

impl<S: PlanStore + SubscriptionStore> SubscriptionManager<S> {
    /// Create a new subscription manager using the system clock.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
            audit: NoOpAuditLogger,
            expiring_soon_days: BillingConfig::default().expiring_soon_days,
        }
    }
}

impl<S, K, A> SubscriptionManager<S, K, A>
where
    S: PlanStore + SubscriptionStore,
    K: Clock,
    A: BillingAuditLogger,
{
    /// Replace the clock.
    #[must_use]
    pub fn with_clock<C: Clock>(self, clock: C) -> SubscriptionManager<S, C, A> {
        SubscriptionManager {
            store: self.store,
            clock,
            audit: self.audit,
            expiring_soon_days: self.expiring_soon_days,
        }
    }

    /// Replace the audit logger.
    #[must_use]
    pub fn with_audit_logger<L: BillingAuditLogger>(self, audit: L) -> SubscriptionManager<S, K, L> {
        SubscriptionManager {
            store: self.store,
            clock: self.clock,
            audit,
            expiring_soon_days: self.expiring_soon_days,
        }
    }

    /// Apply billing settings.
    #[must_use]
    pub fn with_config(mut self, config: &BillingConfig) -> Self {
        self.expiring_soon_days = config.expiring_soon_days;
        self
    }

    /// Every plan, including the built-in free plan.
    pub async fn plans_snapshot(&self) -> Result<Plans> {
        let mut plans: Plans = self.store.list_plans(PlanFilter::All).await?.into_iter().collect();
        if !plans.contains(FREE_PLAN_ID) {
            plans.add(Plan::free());
        }
        Ok(plans)
    }

    /// Get the current subscription for a user.
    ///
    /// Users without a record are on the free plan. A pending downgrade
    /// whose source plan has expired is applied and persisted before the
    /// record is returned.
    pub async fn get(&self, user_id: &str) -> Result<StoredSubscription> {
        let now = self.clock.now();
        match self.store.get_subscription(user_id).await? {
            Some(current) if current.pending_downgrade.is_some() => {
                let plans = self.plans_snapshot().await?;
                self.reconcile(current, &plans, now).await
            }
            Some(current) => Ok(current),
            None => Ok(StoredSubscription::free_default(user_id, now)),
        }
    }

    /// Get the current subscription together with its plan and expiry state.
    pub async fn view(&self, user_id: &str) -> Result<SubscriptionView> {
        let now = self.clock.now();
        let plans = self.plans_snapshot().await?;
        let subscription = self.load(user_id, &plans, now).await?;
        Ok(SubscriptionView::new(
            subscription,
            &plans,
            now,
            self.expiring_soon_days,
        ))
    }

    /// Classify moving a user to `target_plan_id` without committing.
    ///
    /// # Errors
    ///
    /// - `PlanNotFound` if the target does not exist
    /// - `Validation` if the target is not purchasable, or the user already
    ///   holds it and it has not expired
    pub async fn classify(&self, user_id: &str, target_plan_id: &str) -> Result<Classification> {
        let now = self.clock.now();
        let plans = self.plans_snapshot().await?;
        let current = self.load(user_id, &plans, now).await?;
        self.classify_loaded(&current, target_plan_id, &plans, now)
    }

    /// Classify a transition and add display-only context: the tier label
    /// and the day-rate proration over the remaining period.
    pub async fn preview_transition(&self, user_id: &str, target_plan_id: &str) -> Result<TransitionPreview> {
        let now = self.clock.now();
        let plans = self.plans_snapshot().await?;
        let current = self.load(user_id, &plans, now).await?;
        let classification = self.classify_loaded(&current, target_plan_id, &plans, now)?;

        let tier = validate_transition(&current.plan_id, target_plan_id).ok();
        let days_remaining = days_until_expiry(current.expiry_date, now)
            .map_or(0, |d| u32::try_from(d.max(0)).unwrap_or(u32::MAX));
        let proration = classification
            .current_plan
            .as_ref()
            .filter(|plan| !plan.is_free())
            .map(|plan| proration_delta(plan, &classification.target_plan, days_remaining));

        Ok(TransitionPreview {
            classification,
            tier,
            proration_delta: proration,
        })
    }

    /// Commit a classification.
    ///
    /// The caller must have collected `amount_due` first when
    /// [`Classification::requires_payment`] is true.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` if the subscription changed since
    /// it was classified. Re-run classify and commit to retry.
    pub async fn commit(&self, classification: &Classification) -> Result<StoredSubscription> {
        let now = self.clock.now();
        let user_id = classification.user_id.as_str();
        let current = self
            .store
            .get_subscription(user_id)
            .await?
            .unwrap_or_else(|| StoredSubscription::free_default(user_id, now));

        if current.version != classification.base_version {
            return Err(self.conflict(user_id));
        }

        let next = next_subscription(&current, classification, now);
        let saved = self.save(&next, classification.base_version).await?;

        let target = &classification.target_plan;
        if classification.kind == TransitionKind::DowngradeActive {
            tracing::info!(
                target: "pawpass::billing",
                user_id = %user_id,
                from_plan = %current.plan_id,
                to_plan = %target.id,
                credit = classification.credit,
                "Downgrade scheduled"
            );
            self.audit
                .log(BillingAuditEvent::DowngradeScheduled {
                    user_id: user_id.to_string(),
                    from_plan: current.plan_id.clone(),
                    to_plan: target.id.clone(),
                    credit: classification.credit,
                })
                .await;
        } else {
            tracing::info!(
                target: "pawpass::billing",
                user_id = %user_id,
                from_plan = %current.plan_id,
                to_plan = %target.id,
                kind = %classification.kind,
                amount_due = classification.amount_due,
                "Transition committed"
            );
            self.audit
                .log(BillingAuditEvent::TransitionCommitted {
                    user_id: user_id.to_string(),
                    from_plan: current.plan_id.clone(),
                    to_plan: target.id.clone(),
                    kind: classification.kind.as_str().to_string(),
                    amount_due: classification.amount_due,
                })
                .await;
        }

        Ok(saved)
    }

    /// Classify, charge and commit in one call.
    ///
    /// Nothing is committed unless the processor approves the charge.
    /// Transitions with nothing due skip the processor.
    ///
    /// # Errors
    ///
    /// - Any error from [`classify`](Self::classify) or [`commit`](Self::commit)
    ///   when nothing was charged
    /// - `PaymentDeclined` if the processor refuses the charge
    /// - Errors returned by the processor itself
    /// - `Internal` if the commit fails after money was taken. This is not
    ///   retryable: the charge must be reconciled before trying again.
    pub async fn checkout<P: ChargeProcessor>(
        &self,
        user_id: &str,
        target_plan_id: &str,
        processor: &P,
    ) -> Result<Checkout> {
        let classification = self.classify(user_id, target_plan_id).await?;

        let charge_reference = if classification.requires_payment() {
            match processor.charge(user_id, classification.amount_due).await? {
                ChargeOutcome::Approved { reference } => Some(reference),
                ChargeOutcome::Declined { reason } => {
                    tracing::warn!(
                        target: "pawpass::billing",
                        user_id = %user_id,
                        amount = classification.amount_due,
                        reason = %reason,
                        "Charge declined"
                    );
                    return Err(BillingError::PaymentDeclined {
                        user_id: user_id.to_string(),
                        amount: classification.amount_due,
                    }
                    .into());
                }
            }
        } else {
            None
        };

        let subscription = match (self.commit(&classification).await, &charge_reference) {
            (Ok(subscription), _) => subscription,
            (Err(err), Some(reference)) => {
                tracing::error!(
                    target: "pawpass::billing",
                    user_id = %user_id,
                    reference = %reference,
                    amount = classification.amount_due,
                    error = %err,
                    "Commit failed after an approved charge"
                );
                return Err(BillingError::Internal {
                    message: format!(
                        "charge {} of {} approved for '{}' but commit failed: {}",
                        reference, classification.amount_due, user_id, err
                    ),
                }
                .into());
            }
            (Err(err), None) => return Err(err),
        };

        Ok(Checkout {
            classification,
            charge_reference,
            subscription,
        })
    }

    /// Suspend a subscription. Expiry is unaffected.
    pub async fn suspend(&self, user_id: &str) -> Result<StoredSubscription> {
        let now = self.clock.now();
        let plans = self.plans_snapshot().await?;
        let current = self.load(user_id, &plans, now).await?;
        if !current.is_active {
            return Ok(current);
        }

        let mut next = current.clone();
        next.is_active = false;
        let saved = self.save(&next, current.version).await?;

        tracing::info!(target: "pawpass::billing", user_id = %user_id, "Subscription suspended");
        self.audit
            .log(BillingAuditEvent::SubscriptionSuspended {
                user_id: user_id.to_string(),
            })
            .await;

        Ok(saved)
    }

    /// Reinstate a suspended subscription.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionNotFound` if the user has no stored record.
    pub async fn reinstate(&self, user_id: &str) -> Result<StoredSubscription> {
        let now = self.clock.now();
        let current = self
            .store
            .get_subscription(user_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotFound {
                user_id: user_id.to_string(),
            })?;
        let current = if current.pending_downgrade.is_some() {
            let plans = self.plans_snapshot().await?;
            self.reconcile(current, &plans, now).await?
        } else {
            current
        };
        if current.is_active {
            return Ok(current);
        }

        let mut next = current.clone();
        next.is_active = true;
        let saved = self.save(&next, current.version).await?;

        tracing::info!(target: "pawpass::billing", user_id = %user_id, "Subscription reinstated");
        self.audit
            .log(BillingAuditEvent::SubscriptionReinstated {
                user_id: user_id.to_string(),
            })
            .await;

        Ok(saved)
    }

    async fn load(&self, user_id: &str, plans: &Plans, now: DateTime<Utc>) -> Result<StoredSubscription> {
        match self.store.get_subscription(user_id).await? {
            Some(current) => self.reconcile(current, plans, now).await,
            None => Ok(StoredSubscription::free_default(user_id, now)),
        }
    }

    async fn reconcile(
        &self,
        current: StoredSubscription,
        plans: &Plans,
        now: DateTime<Utc>,
    ) -> Result<StoredSubscription> {
        let Some(next) = apply_due_downgrade(&current, plans, now) else {
            return Ok(current);
        };

        let saved = self.save(&next, current.version).await?;
        let credit = current.pending_downgrade.as_ref().map_or(0, |p| p.credit);

        tracing::info!(
            target: "pawpass::billing",
            user_id = %saved.user_id,
            from_plan = %current.plan_id,
            to_plan = %saved.plan_id,
            credit,
            "Pending downgrade applied"
        );
        self.audit
            .log(BillingAuditEvent::DowngradeApplied {
                user_id: saved.user_id.clone(),
                plan_id: saved.plan_id.clone(),
                credit,
            })
            .await;

        Ok(saved)
    }

    fn classify_loaded(
        &self,
        current: &StoredSubscription,
        target_plan_id: &str,
        plans: &Plans,
        now: DateTime<Utc>,
    ) -> Result<Classification> {
        let target = plans.get(target_plan_id).ok_or_else(|| BillingError::PlanNotFound {
            plan_id: target_plan_id.to_string(),
        })?;

        if !target.is_active && !target.is_free() {
            return Err(BillingError::validation(
                "plan_id",
                format!("'{}' is not available for purchase", target_plan_id),
            )
            .into());
        }
        if current.plan_id == target.id && !target.is_free() && !current.is_expired(now) {
            return Err(BillingError::validation(
                "plan_id",
                format!("already subscribed to '{}'", target_plan_id),
            )
            .into());
        }

        let classification = classification::classify(current, target_plan_id, plans, now)?;
        tracing::debug!(
            target: "pawpass::billing",
            user_id = %classification.user_id,
            to_plan = %target_plan_id,
            kind = %classification.kind,
            amount_due = classification.amount_due,
            credit = classification.credit,
            "Transition classified"
        );
        Ok(classification)
    }

    async fn save(&self, next: &StoredSubscription, expected_version: u64) -> Result<StoredSubscription> {
        let saved = self
            .store
            .compare_and_save_subscription(&next.user_id, next, expected_version)
            .await?;
        if !saved {
            return Err(self.conflict(&next.user_id));
        }

        let mut stored = next.clone();
        stored.version = expected_version + 1;
        Ok(stored)
    }

    fn conflict(&self, user_id: &str) -> crate::error::PawpassError {
        tracing::warn!(
            target: "pawpass::billing",
            user_id = %user_id,
            "Subscription changed concurrently"
        );
        BillingError::ConcurrentModification {
            user_id: user_id.to_string(),
        }
        .into()
    }
}

/// Outcome of a successful [`SubscriptionManager::checkout`].
#[derive(Debug, Clone)]
#[must_use]
pub struct Checkout {
    /// How the transition was classified.
    pub classification: Classification,
    /// Processor reference, when a charge was made.
    pub charge_reference: Option<String>,
    /// The committed subscription record.
    pub subscription: StoredSubscription,
}

/// Classification plus display-only context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use]
pub struct TransitionPreview {
    /// The classification a checkout would commit.
    pub classification: Classification,
    /// Tier label, when both plans are in the fixed hierarchy.
    pub tier: Option<TierTransition>,
    /// Day-rate difference over the remaining period. Never charged.
    ///
    /// `None` when the user holds no paid plan, since there is no period
    /// left to prorate.
    pub proration_delta: Option<i64>,
}

/// A subscription together with its plan and derived state.
#[derive(Debug, Clone)]
#[must_use]
pub struct SubscriptionView {
    /// The stored record.
    pub subscription: StoredSubscription,
    /// The current plan, if it is still in the catalog.
    pub plan: Option<Plan>,
    /// Whether the plan has lapsed.
    pub is_expired: bool,
    /// Whole days until expiry, rounded up. `None` without an expiry.
    pub days_until_expiry: Option<i64>,
    /// Whether expiry falls within the configured warning window.
    pub is_expiring_soon: bool,
}

impl SubscriptionView {
    fn new(subscription: StoredSubscription, plans: &Plans, now: DateTime<Utc>, threshold_days: u32) -> Self {
        let expiry = subscription.expiry_date;
        Self {
            plan: plans.get(&subscription.plan_id).cloned(),
            is_expired: subscription.is_expired(now),
            days_until_expiry: days_until_expiry(expiry, now),
            is_expiring_soon: is_expiring_soon(expiry, now, threshold_days),
            subscription,
        }
    }

    /// Check if the user can use their plan: not suspended and not expired.
    #[must_use]
    pub fn is_in_good_standing(&self) -> bool {
        self.subscription.is_active && !self.is_expired
    }

    /// Walks the user may book this period.
    ///
    /// Suspended or expired subscriptions get no walks.
    #[must_use]
    pub fn walk_allowance(&self) -> WalkAllowance {
        match &self.plan {
            Some(plan) if self.is_in_good_standing() => plan.walk_allowance(),
            _ => WalkAllowance::None,
        }
    }

    /// Check if the current plan has a specific feature.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.plan.as_ref().is_some_and(|p| p.has_feature(feature))
    }
}

/// Whole days until `expiry`, rounded up. Negative once expired.
#[must_use]
pub fn days_until_expiry(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    expiry.map(|expiry| {
        let millis = (expiry - now).num_milliseconds();
        let days = millis.div_euclid(MILLIS_PER_DAY);
        if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
            days + 1
        } else {
            days
        }
    })
}

/// Check if `expiry` is between 1 and `threshold_days` days away.
#[must_use]
pub fn is_expiring_soon(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold_days: u32) -> bool {
    days_until_expiry(expiry, now).is_some_and(|days| days > 0 && days <= i64::from(threshold_days))
}
