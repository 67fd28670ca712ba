//! Plan definitions.
//!
//! A [`Plan`] is a purchasable tier. Plans are normally loaded from a
//! [`PlanStore`](super::storage::PlanStore) and mutated only through the
//! [`PlanCatalog`](super::catalog::PlanCatalog), which enforces governance
//! rules. The builder here is a convenience for seeding and tests:
//!
//! ```rust,ignore
//! use pawpass::billing::{Plan, PlanDuration};
//!
//! let gold = Plan::builder("gold")
//!     .name("Gold")
//!     .price(2000)
//!     .duration(PlanDuration::Monthly)
//!     .max_walks(20)
//!     .features(["Priority matching", "GPS tracking"])
//!     .build();
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier of the reserved free plan.
pub const FREE_PLAN_ID: &str = "free";

/// A purchasable subscription tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Stable plan identifier (e.g., "bronze", "gold").
    pub id: String,
    /// Display name.
    pub name: String,
    /// Price in minor currency units.
    pub price: i64,
    /// Billing period.
    pub duration: PlanDuration,
    /// Walks included per period. -1 is unlimited, 0 is none.
    pub max_walks: i32,
    /// Ordered feature list shown to users.
    pub features: Vec<String>,
    /// Discount applied to the price at purchase time (0-100).
    pub discount_percentage: u8,
    /// Whether the plan is available for purchase.
    pub is_active: bool,
}

impl Plan {
    /// Start building a plan with the given ID.
    #[must_use]
    pub fn builder(id: &str) -> PlanBuilder {
        PlanBuilder::new(id)
    }

    /// The reserved free plan.
    #[must_use]
    pub fn free() -> Self {
        Self {
            id: FREE_PLAN_ID.to_string(),
            name: "Free".to_string(),
            price: 0,
            duration: PlanDuration::Forever,
            max_walks: 0,
            features: vec!["Browse walkers".to_string()],
            discount_percentage: 0,
            is_active: true,
        }
    }

    /// Check if this is the reserved free plan.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.id == FREE_PLAN_ID
    }

    /// Price after the plan's discount.
    ///
    /// The discount is rounded up to the next minor unit, so any non-zero
    /// discount on a non-zero price lowers it. Never goes below zero.
    #[must_use]
    pub fn final_price(&self) -> i64 {
        let price = i128::from(self.price.max(0));
        let pct = i128::from(self.discount_percentage.min(100));
        let discount = (price * pct + 99) / 100;
        i64::try_from((price - discount).max(0)).unwrap_or(0)
    }

    /// Walks allowance for one billing period.
    #[must_use]
    pub fn walk_allowance(&self) -> WalkAllowance {
        match self.max_walks {
            n if n < 0 => WalkAllowance::Unlimited,
            0 => WalkAllowance::None,
            n => WalkAllowance::Limited(n as u32),
        }
    }

    /// Check if this plan has a specific feature.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Get the final price formatted for display (e.g., "9.99").
    #[must_use]
    pub fn formatted_price(&self) -> String {
        let price = self.final_price();
        format!("{}.{:02}", price / 100, price % 100)
    }
}

/// Billing period of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanDuration {
    /// Renews every 7 days.
    Weekly,
    /// Renews every calendar month.
    Monthly,
    /// Renews every calendar year.
    Yearly,
    /// Never expires.
    Forever,
}

impl PlanDuration {
    /// Parse a duration string. Unrecognized values fall back to monthly.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "weekly" | "week" => Self::Weekly,
            "monthly" | "month" => Self::Monthly,
            "yearly" | "year" | "annual" => Self::Yearly,
            "forever" | "lifetime" => Self::Forever,
            _ => Self::Monthly,
        }
    }

    /// Convert to string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Forever => "forever",
        }
    }

    /// Nominal period length in days used for daily rates.
    ///
    /// `None` for forever plans, which have no period to prorate over.
    #[must_use]
    pub fn period_days(&self) -> Option<u32> {
        match self {
            Self::Weekly => Some(7),
            Self::Monthly => Some(30),
            Self::Yearly => Some(365),
            Self::Forever => None,
        }
    }
}

impl std::fmt::Display for PlanDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Walks a plan grants per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAllowance {
    /// No cap on walks.
    Unlimited,
    /// The plan includes no walks.
    None,
    /// Up to this many walks.
    Limited(u32),
}

impl WalkAllowance {
    /// Check whether another walk may be booked after `used` walks.
    #[must_use]
    pub fn permits(&self, used: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::None => false,
            Self::Limited(max) => used < *max,
        }
    }

    /// Walks left after `used`, or `None` when unlimited.
    #[must_use]
    pub fn remaining(&self, used: u32) -> Option<u32> {
        match self {
            Self::Unlimited => None,
            Self::None => Some(0),
            Self::Limited(max) => Some(max.saturating_sub(used)),
        }
    }
}

/// A snapshot of plans, keyed by ID.
///
/// The classifier works against a snapshot so it stays a pure function of
/// its inputs.
#[derive(Clone, Debug, Default)]
pub struct Plans {
    plans: HashMap<String, Plan>,
}

impl Plans {
    /// Create a new empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a plan.
    pub fn add(&mut self, plan: Plan) {
        self.plans.insert(plan.id.clone(), plan);
    }

    /// Get a plan by ID.
    #[must_use]
    pub fn get(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.get(plan_id)
    }

    /// Check if a plan exists.
    #[must_use]
    pub fn contains(&self, plan_id: &str) -> bool {
        self.plans.contains_key(plan_id)
    }

    /// Get the number of plans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Check if there are no plans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Iterate over all plans in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }

    /// Active plans sorted by price, ties broken by ID.
    #[must_use]
    pub fn active_by_price(&self) -> Vec<&Plan> {
        let mut active: Vec<&Plan> = self.plans.values().filter(|p| p.is_active).collect();
        sort_by_price(&mut active);
        active
    }

    /// Number of active plans that count against the quota.
    #[must_use]
    pub fn active_paid_count(&self) -> usize {
        count_active_paid(self.plans.values())
    }
}

impl FromIterator<Plan> for Plans {
    fn from_iter<I: IntoIterator<Item = Plan>>(iter: I) -> Self {
        let plans = iter.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self { plans }
    }
}

/// Sort plans ascending by price, then by ID.
pub(crate) fn sort_by_price<P: std::borrow::Borrow<Plan>>(plans: &mut [P]) {
    plans.sort_by(|a, b| {
        let (a, b) = (a.borrow(), b.borrow());
        a.price.cmp(&b.price).then_with(|| a.id.cmp(&b.id))
    });
}

/// Count active plans excluding the free plan.
pub(crate) fn count_active_paid<'a>(plans: impl Iterator<Item = &'a Plan>) -> usize {
    plans.filter(|p| p.is_active && !p.is_free()).count()
}

/// Partial update for a plan. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPatch {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub duration: Option<PlanDuration>,
    pub max_walks: Option<i32>,
    pub features: Option<Vec<String>>,
    pub discount_percentage: Option<u8>,
    pub is_active: Option<bool>,
}

impl PlanPatch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to a copy of `plan`.
    #[must_use]
    pub fn apply_to(&self, plan: &Plan) -> Plan {
        let mut next = plan.clone();
        if let Some(ref name) = self.name {
            next.name = name.clone();
        }
        if let Some(price) = self.price {
            next.price = price;
        }
        if let Some(duration) = self.duration {
            next.duration = duration;
        }
        if let Some(max_walks) = self.max_walks {
            next.max_walks = max_walks;
        }
        if let Some(ref features) = self.features {
            next.features = features.clone();
        }
        if let Some(discount) = self.discount_percentage {
            next.discount_percentage = discount;
        }
        if let Some(is_active) = self.is_active {
            next.is_active = is_active;
        }
        next
    }
}

/// Builder for a single plan.
#[derive(Debug)]
pub struct PlanBuilder {
    plan: Plan,
}

impl PlanBuilder {
    fn new(id: &str) -> Self {
        Self {
            plan: Plan {
                id: id.to_string(),
                name: id.to_string(),
                price: 0,
                duration: PlanDuration::Monthly,
                max_walks: -1,
                features: Vec::new(),
                discount_percentage: 0,
                is_active: true,
            },
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.plan.name = name.to_string();
        self
    }

    /// Set the price in minor units.
    #[must_use]
    pub fn price(mut self, price: i64) -> Self {
        self.plan.price = price;
        self
    }

    /// Set the billing period.
    #[must_use]
    pub fn duration(mut self, duration: PlanDuration) -> Self {
        self.plan.duration = duration;
        self
    }

    /// Set the walks included per period.
    #[must_use]
    pub fn max_walks(mut self, max_walks: i32) -> Self {
        self.plan.max_walks = max_walks;
        self
    }

    /// Add features to this plan.
    #[must_use]
    pub fn features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plan.features.extend(features.into_iter().map(Into::into));
        self
    }

    /// Set the discount percentage.
    #[must_use]
    pub fn discount(mut self, percentage: u8) -> Self {
        self.plan.discount_percentage = percentage;
        self
    }

    /// Set whether the plan is purchasable.
    #[must_use]
    pub fn active(mut self, is_active: bool) -> Self {
        self.plan.is_active = is_active;
        self
    }

    /// Finish the plan. No validation happens here.
    #[must_use]
    pub fn build(self) -> Plan {
        self.plan
    }
}
