//! Test fixtures and generators for billing data
//!
//! This module provides helpers for creating plans and subscriptions in a
//! consistent way.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::billing::{Plan, PlanDuration, StoredSubscription, compute_expiry};

/// Helper functions for generating fake test data
pub mod fake {
    use super::*;

    /// Generate a fake user ID
    pub fn user_id() -> String {
        format!("user_{}", &Uuid::new_v4().simple().to_string()[..12])
    }

    /// Generate a fake plan ID that passes validation
    pub fn plan_id() -> String {
        format!("plan_{}", &Uuid::new_v4().simple().to_string()[..8])
    }

    /// Generate a fake UUID as a string
    pub fn uuid() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate a random price in minor units between min and max
    pub fn price(min: i64, max: i64) -> i64 {
        fastrand::i64(min..=max)
    }

    /// Generate a random discount percentage
    pub fn discount() -> u8 {
        fastrand::u8(0..=100)
    }

    /// Generate a valid paid plan with random attributes
    pub fn plan() -> Plan {
        Plan::builder(&plan_id())
            .name(&format!("Plan {}", fastrand::u16(100..1000)))
            .price(price(100, 10_000))
            .max_walks(fastrand::i32(-1..=30))
            .features(["Walks"])
            .discount(discount())
            .active(false)
            .build()
    }
}

/// The standard tier ladder.
///
/// Free, bronze (500), silver (1000) and gold (2000) are active; platinum
/// (4000) is inactive so the active quota is exactly full.
pub fn tiered_plans() -> Vec<Plan> {
    vec![
        Plan::free(),
        Plan::builder("bronze")
            .name("Bronze")
            .price(500)
            .max_walks(4)
            .features(["Walker search", "Booking"])
            .build(),
        Plan::builder("silver")
            .name("Silver")
            .price(1000)
            .max_walks(8)
            .features(["Walker search", "Booking", "GPS tracking"])
            .build(),
        Plan::builder("gold")
            .name("Gold")
            .price(2000)
            .max_walks(20)
            .features(["Walker search", "Booking", "GPS tracking", "Priority matching"])
            .build(),
        Plan::builder("platinum")
            .name("Platinum")
            .price(4000)
            .duration(PlanDuration::Yearly)
            .max_walks(-1)
            .features(["Everything"])
            .active(false)
            .build(),
    ]
}

/// A subscription to `plan` that started at `start`.
pub fn subscription_on(user_id: &str, plan: &Plan, start: DateTime<Utc>) -> StoredSubscription {
    let mut sub = StoredSubscription::free_default(user_id, start);
    sub.plan_id = plan.id.clone();
    if !plan.is_free() {
        sub.expiry_date = compute_expiry(plan.duration, start);
    }
    sub
}
