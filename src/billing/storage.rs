//! Storage traits for billing data.
//!
//! Implement these traits to persist plans and subscriptions to your
//! database. Absent records are reported as `Ok(None)`; the engine turns
//! them into `NotFound` errors or the free-plan default as appropriate.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plans::{FREE_PLAN_ID, Plan, count_active_paid};

/// A user's current subscription record.
///
/// This is the single normalized shape the engine works with; any legacy
/// field naming is resolved by the store before records reach the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSubscription {
    /// Owning user.
    pub user_id: String,
    /// Plan currently in effect.
    pub plan_id: String,
    /// When the current plan was activated.
    pub start_date: DateTime<Utc>,
    /// When the current plan lapses. `None` for free and forever plans.
    pub expiry_date: Option<DateTime<Utc>>,
    /// Administrative flag, independent of expiry.
    pub is_active: bool,
    /// Downgrade waiting for the current plan to expire.
    pub pending_downgrade: Option<PendingDowngrade>,
    /// Credit carried towards the next paid renewal.
    #[serde(default)]
    pub credit_balance: i64,
    /// Record version for compare-and-set. Assigned by the store.
    pub version: u64,
}

impl StoredSubscription {
    /// The record every user has before their first purchase.
    #[must_use]
    pub fn free_default(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            plan_id: FREE_PLAN_ID.to_string(),
            start_date: now,
            expiry_date: None,
            is_active: true,
            pending_downgrade: None,
            credit_balance: 0,
            version: 0,
        }
    }

    /// Check if the subscription is on the free plan.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.plan_id == FREE_PLAN_ID
    }

    /// Check if the subscription has lapsed at `now`.
    ///
    /// Expiry is derived from `expiry_date` only; `is_active` does not
    /// affect it.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < now)
    }
}

/// A downgrade that takes effect when the current plan expires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingDowngrade {
    /// Plan to switch to.
    pub plan_id: String,
    /// Credit owed towards the next renewal.
    pub credit: i64,
    /// When the downgrade was requested.
    pub requested_at: DateTime<Utc>,
}

/// Which plans to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanFilter {
    /// Every plan.
    #[default]
    All,
    /// Only purchasable plans.
    Active,
}

impl PlanFilter {
    /// Check if a plan passes the filter.
    #[must_use]
    pub fn matches(&self, plan: &Plan) -> bool {
        match self {
            Self::All => true,
            Self::Active => plan.is_active,
        }
    }
}

/// Outcome of a quota-checked plan write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum QuotaCheck {
    /// The plan was written.
    Saved,
    /// The write was refused; `active` plans already count against the quota.
    Exceeded { active: usize },
}

/// Trait for storing plan data.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Get a plan by ID.
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>>;

    /// List plans matching the filter.
    async fn list_plans(&self, filter: PlanFilter) -> Result<Vec<Plan>>;

    /// Insert or replace a plan unconditionally.
    async fn save_plan(&self, plan: &Plan) -> Result<()>;

    /// Insert or replace a plan, refusing if the result would leave more
    /// than `max_active` non-free plans active.
    ///
    /// # Important: Production Implementations MUST Override This
    ///
    /// The default implementation reads the count and writes separately,
    /// so two concurrent activations can both pass the check. Production
    /// implementations MUST override this with a single transactional
    /// check-and-write, for example:
    ///
    /// ```sql
    /// INSERT INTO plans (...) SELECT ...
    /// WHERE (SELECT count(*) FROM plans
    ///        WHERE is_active AND id <> 'free' AND id <> $1) < $max
    /// ```
    async fn save_plan_within_quota(&self, plan: &Plan, max_active: usize) -> Result<QuotaCheck> {
        #[cfg(debug_assertions)]
        {
            static WARNED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);
            if !WARNED.swap(true, std::sync::atomic::Ordering::Relaxed) {
                tracing::warn!(
                    target: "pawpass::billing",
                    "Using default non-atomic save_plan_within_quota implementation. \
                     This is NOT safe for production use with concurrent requests."
                );
            }
        }

        if plan.is_active && !plan.is_free() {
            let others = self.list_plans(PlanFilter::Active).await?;
            let active = count_active_paid(others.iter().filter(|p| p.id != plan.id));
            if active >= max_active {
                return Ok(QuotaCheck::Exceeded { active });
            }
        }
        self.save_plan(plan).await?;
        Ok(QuotaCheck::Saved)
    }

    /// Delete a plan by ID. Deleting a missing plan is not an error.
    async fn delete_plan(&self, plan_id: &str) -> Result<()>;
}

/// Trait for storing subscription data.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Get the subscription for a user.
    async fn get_subscription(&self, user_id: &str) -> Result<Option<StoredSubscription>>;

    /// Replace the subscription only if its version still equals
    /// `expected_version` (0 when no record exists yet).
    ///
    /// On success the store persists the record with version
    /// `expected_version + 1` and returns `Ok(true)`. A version mismatch
    /// returns `Ok(false)` and changes nothing. This must be atomic:
    ///
    /// ```sql
    /// UPDATE subscriptions SET ..., version = version + 1
    /// WHERE user_id = $1 AND version = $2
    /// ```
    async fn compare_and_save_subscription(
        &self,
        user_id: &str,
        subscription: &StoredSubscription,
        expected_version: u64,
    ) -> Result<bool>;

    /// Check if any subscription uses the plan, either as its current plan
    /// or as a pending downgrade target.
    async fn is_plan_referenced(&self, plan_id: &str) -> Result<bool>;
}

/// In-memory store for tests and embedding.
pub mod memory {
    use super::*;
    use crate::error::PawpassError;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

    /// In-memory billing store.
    ///
    /// Wraps data in Arc for cheap cloning. Each write holds the lock for
    /// its whole check-and-set, so quota checks and version checks are
    /// atomic.
    #[derive(Default, Clone)]
    pub struct InMemoryBillingStore {
        inner: Arc<InMemoryBillingStoreInner>,
    }

    #[derive(Default)]
    struct InMemoryBillingStoreInner {
        subscriptions: RwLock<HashMap<String, StoredSubscription>>,
        plans: RwLock<HashMap<String, Plan>>,
    }

    fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
        lock.read()
            .map_err(|_| PawpassError::storage("in-memory store lock poisoned"))
    }

    fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
        lock.write()
            .map_err(|_| PawpassError::storage("in-memory store lock poisoned"))
    }

    impl InMemoryBillingStore {
        /// Create a new in-memory store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a store seeded with plans.
        #[must_use]
        pub fn with_plans(plans: impl IntoIterator<Item = Plan>) -> Self {
            let store = Self::new();
            if let Ok(mut map) = store.inner.plans.write() {
                for plan in plans {
                    map.insert(plan.id.clone(), plan);
                }
            }
            store
        }
    }

    #[async_trait]
    impl PlanStore for InMemoryBillingStore {
        async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
            Ok(read(&self.inner.plans)?.get(plan_id).cloned())
        }

        async fn list_plans(&self, filter: PlanFilter) -> Result<Vec<Plan>> {
            let plans = read(&self.inner.plans)?;
            let mut listed: Vec<Plan> = plans.values().filter(|p| filter.matches(p)).cloned().collect();
            listed.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(listed)
        }

        async fn save_plan(&self, plan: &Plan) -> Result<()> {
            write(&self.inner.plans)?.insert(plan.id.clone(), plan.clone());
            Ok(())
        }

        async fn save_plan_within_quota(&self, plan: &Plan, max_active: usize) -> Result<QuotaCheck> {
            let mut plans = write(&self.inner.plans)?;

            if plan.is_active && !plan.is_free() {
                let active = count_active_paid(plans.values().filter(|p| p.id != plan.id));
                if active >= max_active {
                    return Ok(QuotaCheck::Exceeded { active });
                }
            }

            plans.insert(plan.id.clone(), plan.clone());
            Ok(QuotaCheck::Saved)
        }

        async fn delete_plan(&self, plan_id: &str) -> Result<()> {
            write(&self.inner.plans)?.remove(plan_id);
            Ok(())
        }
    }

    #[async_trait]
    impl SubscriptionStore for InMemoryBillingStore {
        async fn get_subscription(&self, user_id: &str) -> Result<Option<StoredSubscription>> {
            Ok(read(&self.inner.subscriptions)?.get(user_id).cloned())
        }

        async fn compare_and_save_subscription(
            &self,
            user_id: &str,
            subscription: &StoredSubscription,
            expected_version: u64,
        ) -> Result<bool> {
            let mut subs = write(&self.inner.subscriptions)?;

            let current_version = subs.get(user_id).map_or(0, |s| s.version);
            if current_version != expected_version {
                return Ok(false);
            }

            let mut saved = subscription.clone();
            saved.user_id = user_id.to_string();
            saved.version = expected_version + 1;
            subs.insert(user_id.to_string(), saved);
            Ok(true)
        }

        async fn is_plan_referenced(&self, plan_id: &str) -> Result<bool> {
            let subs = read(&self.inner.subscriptions)?;
            Ok(subs.values().any(|s| {
                s.plan_id == plan_id
                    || s.pending_downgrade.as_ref().is_some_and(|p| p.plan_id == plan_id)
            }))
        }
    }
}
