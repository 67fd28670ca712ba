//! Testing utilities for Pawpass embedders
//!
//! This module provides tools for exercising the lifecycle engine without a
//! database or payment gateway:
//! - Recording audit logger and mock charge processor
//! - Plan fixtures and fake data generators
//!
//! # Example
//!
//! ```rust,ignore
//! use pawpass::billing::{FixedClock, InMemoryBillingStore, SubscriptionManager};
//! use pawpass::testing::{MockChargeProcessor, fixtures};
//!
//! #[tokio::test]
//! async fn test_checkout() {
//!     let store = InMemoryBillingStore::with_plans(fixtures::tiered_plans());
//!     let manager = SubscriptionManager::new(store).with_clock(FixedClock::new(chrono::Utc::now()));
//!
//!     let checkout = manager
//!         .checkout("user_1", "silver", &MockChargeProcessor::approving())
//!         .await
//!         .unwrap();
//!     assert_eq!(checkout.subscription.plan_id, "silver");
//! }
//! ```

mod doubles;
pub mod fixtures;

pub use doubles::{MockChargeProcessor, RecordingAuditLogger};
pub use fixtures::fake;
