//! Subscription and plan lifecycle engine.
//!
//! Decides how a user's paid plan changes over time: new purchases,
//! renewals, upgrades, deferred downgrades and expiry. Plan administration
//! is governed by a small set of rules: the free plan is locked, at most
//! three paid plans are active at once, and plans in use cannot be deleted.
//!
//! Payment collection stays outside the engine. Classify a change, charge
//! the amount it reports, then commit it.
//!
//! # Example
//!
//! ```rust,ignore
//! use pawpass::billing::{InMemoryBillingStore, PlanCatalog, SubscriptionManager};
//!
//! let store = InMemoryBillingStore::new();
//! let catalog = PlanCatalog::new(store.clone());
//! let manager = SubscriptionManager::new(store);
//!
//! // Show the user what a change costs
//! let classification = manager.classify(&user_id, "gold").await?;
//!
//! // Charge it through your gateway, then commit
//! if classification.requires_payment() {
//!     gateway.charge(&user_id, classification.amount_due).await?;
//! }
//! let subscription = manager.commit(&classification).await?;
//! ```

pub mod audit;
pub mod catalog;
pub mod charge;
pub mod classification;
pub mod clock;
pub mod error;
pub mod governance;
pub mod plans;
pub mod proration;
pub mod storage;
pub mod subscription;
pub mod validation;

// Plan exports
pub use plans::{FREE_PLAN_ID, Plan, PlanBuilder, PlanDuration, PlanPatch, Plans, WalkAllowance};

// Storage exports
pub use storage::memory::InMemoryBillingStore;
pub use storage::{PendingDowngrade, PlanFilter, PlanStore, QuotaCheck, StoredSubscription, SubscriptionStore};

// Catalog exports
pub use catalog::PlanCatalog;

// Classification exports
pub use classification::{
    Classification, TransitionKind, apply_due_downgrade, classify, compute_expiry, next_subscription,
};

// Subscription exports
pub use subscription::{
    Checkout, SubscriptionManager, SubscriptionView, TransitionPreview, days_until_expiry,
    is_expiring_soon,
};

// Proration exports
pub use proration::{daily_rate, proration_delta};

// Governance exports
pub use governance::{MAX_ACTIVE_PLANS, TierTransition, ensure_mutable, tier_rank, validate_transition};

// Collaborator exports
pub use charge::{ChargeOutcome, ChargeProcessor};
pub use clock::{Clock, FixedClock, SystemClock};

// Audit exports
pub use audit::{BillingAuditEvent, BillingAuditLogger, NoOpAuditLogger, TracingAuditLogger};

// Error exports
pub use error::BillingError;

// Validation exports
pub use validation::{validate_plan, validate_plan_id};
