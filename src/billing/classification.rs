//! Transition classification.
//!
//! Given a user's current subscription and a target plan, decide what kind
//! of change it is and what it costs. Classification is a pure function of
//! its inputs: the same subscription, target and plan snapshot always give
//! the same answer.
//!
//! Rules are checked in order and the first match wins:
//!
//! 1. target is the free plan: `free`
//! 2. same plan and current has expired: `renewal`
//! 3. discounted target price above the price of a paid current plan:
//!    `upgrade`
//! 4. discounted target price below current price on a paid plan:
//!    `downgrade_expired` or `downgrade_active`
//! 5. anything else: `new`

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use super::error::BillingError;
use super::plans::{FREE_PLAN_ID, Plan, PlanDuration, Plans};
use super::storage::{PendingDowngrade, StoredSubscription};

/// Kind of plan change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Switching to the free plan. Any paid plan ends immediately.
    Free,
    /// Buying the same plan again after it expired.
    Renewal,
    /// Moving to a more expensive plan; only the difference is due.
    Upgrade,
    /// Moving to a cheaper plan while the current one still runs.
    DowngradeActive,
    /// Moving to a cheaper plan after the current one expired.
    DowngradeExpired,
    /// First purchase, or a move between equally priced plans.
    New,
}

impl TransitionKind {
    /// Convert to string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Renewal => "renewal",
            Self::Upgrade => "upgrade",
            Self::DowngradeActive => "downgrade_active",
            Self::DowngradeExpired => "downgrade_expired",
            Self::New => "new",
        }
    }

    /// Check if committing this transition replaces the current plan now.
    #[must_use]
    pub fn takes_effect_immediately(&self) -> bool {
        !matches!(self, Self::DowngradeActive)
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of classifying a plan change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Classification {
    /// User the classification was computed for.
    pub user_id: String,
    /// Kind of change.
    pub kind: TransitionKind,
    /// Amount to charge before committing.
    pub amount_due: i64,
    /// Credit recorded for the next renewal.
    pub credit: i64,
    /// Current plan, if it is still in the catalog. Display only.
    pub current_plan: Option<Plan>,
    /// Plan being moved to.
    pub target_plan: Plan,
    /// Whether the current subscription had expired. Display only.
    pub is_expired: bool,
    /// Version of the subscription record this was computed from.
    pub base_version: u64,
}

impl Classification {
    /// Check if a charge must succeed before committing.
    #[must_use]
    pub fn requires_payment(&self) -> bool {
        self.amount_due > 0
    }
}

/// Classify moving `current` to `target_plan_id`.
///
/// A current plan missing from the snapshot is treated like the free plan:
/// the user has no paid plan, so any paid target is `new`.
///
/// # Errors
///
/// Returns `BillingError::PlanNotFound` if the target is not in `plans`.
pub fn classify(
    current: &StoredSubscription,
    target_plan_id: &str,
    plans: &Plans,
    now: DateTime<Utc>,
) -> Result<Classification, BillingError> {
    let target = plans
        .get(target_plan_id)
        .ok_or_else(|| BillingError::PlanNotFound {
            plan_id: target_plan_id.to_string(),
        })?;

    let current_plan = plans.get(&current.plan_id);
    let current_price = current_plan.map_or(0, |p| p.price.max(0));
    let current_is_paid = current_plan.is_some_and(|p| !p.is_free());

    let target_price = target.final_price();
    let is_expired = current.is_expired(now);
    let is_same_plan = current.plan_id == target.id;

    let (kind, amount_due, credit) = if target.is_free() {
        (TransitionKind::Free, 0, 0)
    } else if is_same_plan && is_expired {
        (TransitionKind::Renewal, target_price, 0)
    } else if target_price > current_price && current_is_paid && !is_same_plan {
        (TransitionKind::Upgrade, target_price - current_price, 0)
    } else if target_price < current_price && current_is_paid {
        if is_expired {
            (TransitionKind::DowngradeExpired, target_price, 0)
        } else {
            (TransitionKind::DowngradeActive, 0, current_price - target_price)
        }
    } else {
        (TransitionKind::New, target_price, 0)
    };

    Ok(Classification {
        user_id: current.user_id.clone(),
        kind,
        amount_due: amount_due.max(0),
        credit: credit.max(0),
        current_plan: current_plan.cloned(),
        target_plan: target.clone(),
        is_expired,
        base_version: current.version,
    })
}

/// When a plan bought at `from` lapses. `None` means never.
///
/// Months and years follow the calendar, so a monthly plan bought on
/// 31 January lapses on the last day of February.
#[must_use]
pub fn compute_expiry(duration: PlanDuration, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let expiry = match duration {
        PlanDuration::Forever => return None,
        PlanDuration::Weekly => from.checked_add_signed(Duration::days(7)),
        PlanDuration::Monthly => from.checked_add_months(Months::new(1)),
        PlanDuration::Yearly => from.checked_add_months(Months::new(12)),
    };
    Some(expiry.unwrap_or(DateTime::<Utc>::MAX_UTC))
}

/// The record to store when committing `classification` at `now`.
#[must_use]
pub fn next_subscription(
    current: &StoredSubscription,
    classification: &Classification,
    now: DateTime<Utc>,
) -> StoredSubscription {
    let target = &classification.target_plan;

    if classification.kind == TransitionKind::DowngradeActive {
        let mut next = current.clone();
        next.pending_downgrade = Some(PendingDowngrade {
            plan_id: target.id.clone(),
            credit: classification.credit,
            requested_at: now,
        });
        return next;
    }

    StoredSubscription {
        user_id: current.user_id.clone(),
        plan_id: target.id.clone(),
        start_date: now,
        expiry_date: expiry_for(target, now),
        is_active: true,
        pending_downgrade: None,
        credit_balance: current.credit_balance,
        version: current.version,
    }
}

/// Apply a pending downgrade whose source plan has expired.
///
/// The new plan starts when the old one lapsed and the recorded credit
/// moves to the balance. A target that has vanished from the catalog falls
/// back to the free plan. Returns `None` when nothing is due.
#[must_use]
pub fn apply_due_downgrade(
    current: &StoredSubscription,
    plans: &Plans,
    now: DateTime<Utc>,
) -> Option<StoredSubscription> {
    let pending = current.pending_downgrade.as_ref()?;
    if !current.is_expired(now) {
        return None;
    }
    let lapsed_at = current.expiry_date?;

    let (plan_id, expiry_date) = match plans.get(&pending.plan_id) {
        Some(plan) => (plan.id.clone(), expiry_for(plan, lapsed_at)),
        None => {
            tracing::warn!(
                target: "pawpass::billing",
                user_id = %current.user_id,
                plan_id = %pending.plan_id,
                "Pending downgrade target no longer exists, reverting to free plan"
            );
            (FREE_PLAN_ID.to_string(), None)
        }
    };

    Some(StoredSubscription {
        user_id: current.user_id.clone(),
        plan_id,
        start_date: lapsed_at,
        expiry_date,
        is_active: current.is_active,
        pending_downgrade: None,
        credit_balance: current.credit_balance + pending.credit,
        version: current.version,
    })
}

fn expiry_for(plan: &Plan, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if plan.is_free() {
        None
    } else {
        compute_expiry(plan.duration, from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap()
    }

    fn plan(id: &str, price: i64, discount: u8) -> Plan {
        Plan::builder(id)
            .price(price)
            .discount(discount)
            .features(["Walks"])
            .build()
    }

    fn catalog() -> Plans {
        vec![
            Plan::free(),
            plan("bronze", 500, 0),
            plan("silver", 1000, 0),
            plan("gold", 2000, 0),
        ]
        .into_iter()
        .collect()
    }

    fn on(plan_id: &str, expired: bool) -> StoredSubscription {
        let mut sub = StoredSubscription::free_default("user_1", now() - Duration::days(20));
        sub.plan_id = plan_id.to_string();
        sub.expiry_date = Some(if expired {
            now() - Duration::days(1)
        } else {
            now() + Duration::days(10)
        });
        sub
    }

    #[test]
    fn test_upgrade_charges_difference() {
        let c = classify(&on("silver", false), "gold", &catalog(), now()).unwrap();
        assert_eq!(c.kind, TransitionKind::Upgrade);
        assert_eq!(c.amount_due, 1000);
        assert_eq!(c.credit, 0);
        assert!(c.requires_payment());
    }

    #[test]
    fn test_renewal_of_expired_plan() {
        let c = classify(&on("gold", true), "gold", &catalog(), now()).unwrap();
        assert_eq!(c.kind, TransitionKind::Renewal);
        assert_eq!(c.amount_due, 2000);
        assert!(c.is_expired);
    }

    #[test]
    fn test_renewal_uses_target_discount() {
        let mut plans = catalog();
        plans.add(plan("bronze", 500, 10));
        let c = classify(&on("bronze", true), "bronze", &plans, now()).unwrap();
        assert_eq!(c.kind, TransitionKind::Renewal);
        assert_eq!(c.amount_due, 450);
    }

    #[test]
    fn test_downgrade_while_active_defers_with_credit() {
        let c = classify(&on("gold", false), "bronze", &catalog(), now()).unwrap();
        assert_eq!(c.kind, TransitionKind::DowngradeActive);
        assert_eq!(c.amount_due, 0);
        assert_eq!(c.credit, 1500);
        assert!(!c.kind.takes_effect_immediately());
    }

    #[test]
    fn test_downgrade_after_expiry_charges_full_price() {
        let c = classify(&on("gold", true), "bronze", &catalog(), now()).unwrap();
        assert_eq!(c.kind, TransitionKind::DowngradeExpired);
        assert_eq!(c.amount_due, 500);
        assert_eq!(c.credit, 0);
    }

    #[test]
    fn test_new_from_free_with_discount() {
        let mut plans = catalog();
        plans.add(plan("silver", 1000, 20));
        let sub = StoredSubscription::free_default("user_1", now());
        let c = classify(&sub, "silver", &plans, now()).unwrap();
        assert_eq!(c.kind, TransitionKind::New);
        assert_eq!(c.amount_due, 800);
    }

    #[test]
    fn test_free_to_paid_is_new_not_upgrade() {
        let sub = StoredSubscription::free_default("user_1", now());
        for target in ["bronze", "silver", "gold"] {
            let c = classify(&sub, target, &catalog(), now()).unwrap();
            assert_eq!(c.kind, TransitionKind::New);
            assert_eq!(c.amount_due, catalog().get(target).unwrap().final_price());
        }
    }

    #[test]
    fn test_switch_to_free() {
        let c = classify(&on("gold", false), FREE_PLAN_ID, &catalog(), now()).unwrap();
        assert_eq!(c.kind, TransitionKind::Free);
        assert_eq!(c.amount_due, 0);
        assert!(!c.requires_payment());
    }

    #[test]
    fn test_equal_price_is_new() {
        let mut plans = catalog();
        plans.add(plan("teal", 1000, 0));
        let c = classify(&on("silver", false), "teal", &plans, now()).unwrap();
        assert_eq!(c.kind, TransitionKind::New);
        assert_eq!(c.amount_due, 1000);
    }

    #[test]
    fn test_unknown_current_plan_counts_as_free() {
        let c = classify(&on("retired", false), "bronze", &catalog(), now()).unwrap();
        assert_eq!(c.kind, TransitionKind::New);
        assert_eq!(c.amount_due, 500);
        assert!(c.current_plan.is_none());
    }

    #[test]
    fn test_missing_target_is_not_found() {
        let err = classify(&on("gold", false), "diamond", &catalog(), now()).unwrap_err();
        assert_eq!(
            err,
            BillingError::PlanNotFound {
                plan_id: "diamond".to_string()
            }
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let plans = catalog();
        let sub = on("silver", false);
        for target in ["free", "bronze", "silver", "gold"] {
            let a = classify(&sub, target, &plans, now()).unwrap();
            let b = classify(&sub, target, &plans, now()).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_compute_expiry_uses_calendar() {
        let jan_31 = Utc.with_ymd_and_hms(2025, 1, 31, 8, 0, 0).unwrap();
        assert_eq!(
            compute_expiry(PlanDuration::Monthly, jan_31),
            Some(Utc.with_ymd_and_hms(2025, 2, 28, 8, 0, 0).unwrap())
        );
        assert_eq!(
            compute_expiry(PlanDuration::Weekly, jan_31),
            Some(Utc.with_ymd_and_hms(2025, 2, 7, 8, 0, 0).unwrap())
        );
        let leap = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        assert_eq!(
            compute_expiry(PlanDuration::Yearly, leap),
            Some(Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap())
        );
        assert_eq!(compute_expiry(PlanDuration::Forever, jan_31), None);
    }

    #[test]
    fn test_next_subscription_replaces_plan() {
        let current = on("silver", false);
        let c = classify(&current, "gold", &catalog(), now()).unwrap();
        let next = next_subscription(&current, &c, now());
        assert_eq!(next.plan_id, "gold");
        assert_eq!(next.start_date, now());
        assert_eq!(next.expiry_date, compute_expiry(PlanDuration::Monthly, now()));
        assert!(next.is_active);
    }

    #[test]
    fn test_next_subscription_free_has_no_expiry() {
        let current = on("gold", false);
        let c = classify(&current, FREE_PLAN_ID, &catalog(), now()).unwrap();
        let next = next_subscription(&current, &c, now());
        assert!(next.is_free());
        assert_eq!(next.expiry_date, None);
    }

    #[test]
    fn test_deferred_downgrade_keeps_current_plan() {
        let current = on("gold", false);
        let c = classify(&current, "bronze", &catalog(), now()).unwrap();
        let next = next_subscription(&current, &c, now());
        assert_eq!(next.plan_id, "gold");
        assert_eq!(next.expiry_date, current.expiry_date);
        let pending = next.pending_downgrade.as_ref().unwrap();
        assert_eq!(pending.plan_id, "bronze");
        assert_eq!(pending.credit, 1500);

        // Nothing to apply until gold lapses.
        assert!(apply_due_downgrade(&next, &catalog(), now()).is_none());

        let later = now() + Duration::days(11);
        let applied = apply_due_downgrade(&next, &catalog(), later).unwrap();
        let lapsed_at = current.expiry_date.unwrap();
        assert_eq!(applied.plan_id, "bronze");
        assert_eq!(applied.start_date, lapsed_at);
        assert_eq!(
            applied.expiry_date,
            compute_expiry(PlanDuration::Monthly, lapsed_at)
        );
        assert_eq!(applied.credit_balance, 1500);
        assert!(applied.pending_downgrade.is_none());
    }

    #[test]
    fn test_due_downgrade_to_vanished_plan_reverts_to_free() {
        let mut current = on("gold", true);
        current.pending_downgrade = Some(PendingDowngrade {
            plan_id: "retired".to_string(),
            credit: 100,
            requested_at: now() - Duration::days(5),
        });
        let applied = apply_due_downgrade(&current, &catalog(), now()).unwrap();
        assert!(applied.is_free());
        assert_eq!(applied.expiry_date, None);
    }
}
