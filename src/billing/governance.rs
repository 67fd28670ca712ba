//! Plan governance rules.
//!
//! The catalog consults these before any plan mutation. The tier hierarchy
//! here is for labeling only; money always follows price comparison in
//! [`classify`](super::classification::classify).

use serde::{Deserialize, Serialize};

use super::error::BillingError;
use super::plans::FREE_PLAN_ID;

/// Maximum number of non-free plans that may be active at once.
pub const MAX_ACTIVE_PLANS: usize = 3;

/// Fixed tier order used for upgrade/downgrade labels.
const TIER_HIERARCHY: &[(&str, u8)] = &[
    (FREE_PLAN_ID, 0),
    ("bronze", 1),
    ("silver", 2),
    ("gold", 3),
    ("platinum", 4),
];

/// Reject any mutation of a locked plan.
///
/// # Errors
///
/// Returns `BillingError::PlanLocked` for the free plan.
pub fn ensure_mutable(plan_id: &str) -> Result<(), BillingError> {
    if plan_id == FREE_PLAN_ID {
        tracing::warn!(
            target: "pawpass::billing",
            plan_id = %plan_id,
            "Rejected mutation of locked plan"
        );
        return Err(BillingError::PlanLocked {
            plan_id: plan_id.to_string(),
        });
    }
    Ok(())
}

/// Position of a plan in the tier hierarchy, if it has one.
#[must_use]
pub fn tier_rank(plan_id: &str) -> Option<u8> {
    TIER_HIERARCHY
        .iter()
        .find(|(id, _)| *id == plan_id)
        .map(|(_, rank)| *rank)
}

/// Direction of a move between tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierTransition {
    /// Higher tier.
    Upgrade,
    /// Lower tier.
    Downgrade,
    /// Same tier.
    Same,
}

impl TierTransition {
    /// Convert to string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
            Self::Same => "same",
        }
    }
}

/// Label a move between two tiers of the fixed hierarchy.
///
/// Custom plans outside the hierarchy cannot be labeled this way, even
/// though [`classify`](super::classification::classify) prices them fine.
///
/// # Errors
///
/// Returns `BillingError::Validation` if either plan is not a known tier.
pub fn validate_transition(from_plan_id: &str, to_plan_id: &str) -> Result<TierTransition, BillingError> {
    let from = tier_rank(from_plan_id).ok_or_else(|| {
        BillingError::validation("from_plan_id", format!("'{}' is not a known tier", from_plan_id))
    })?;
    let to = tier_rank(to_plan_id).ok_or_else(|| {
        BillingError::validation("to_plan_id", format!("'{}' is not a known tier", to_plan_id))
    })?;

    Ok(match to.cmp(&from) {
        std::cmp::Ordering::Greater => TierTransition::Upgrade,
        std::cmp::Ordering::Less => TierTransition::Downgrade,
        std::cmp::Ordering::Equal => TierTransition::Same,
    })
}
