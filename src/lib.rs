//! Pawpass - subscription lifecycle engine for a pet-walker marketplace
//!
//! Pawpass owns the rules for how a user's paid plan changes over time.
//! Persistence, payment collection and time are injected collaborators, so
//! the engine runs the same against a database, a test double or a frozen
//! clock.
//!
//! # Features
//!
//! - **Plan catalog**: plan administration with governance rules
//! - **Classification**: pure pricing of upgrades, downgrades and renewals
//! - **Deferred downgrades**: applied on read once the paid plan lapses
//! - **Proration**: day-rate previews of plan changes
//! - **Audit**: one event per committed state change
//! - **Testing**: in-memory store, fixed clock and recording doubles
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pawpass::billing::{InMemoryBillingStore, Plan, PlanCatalog, SubscriptionManager};
//!
//! #[tokio::main]
//! async fn main() -> pawpass::Result<()> {
//!     // Initialize logging
//!     pawpass::init_tracing();
//!
//!     let store = InMemoryBillingStore::new();
//!     let catalog = PlanCatalog::new(store.clone());
//!     catalog
//!         .create(Plan::builder("silver").name("Silver").price(1000).features(["GPS tracking"]).build())
//!         .await?;
//!
//!     let manager = SubscriptionManager::new(store);
//!     let classification = manager.classify("user_1", "silver").await?;
//!     println!("{} costs {}", classification.kind, classification.amount_due);
//!     Ok(())
//! }
//! ```

pub mod billing;
mod config;
mod error;
pub mod testing;
pub use testing::fake;
mod utils;

// Re-exports for public API
pub use config::{BillingConfig, Config, ConfigBuilder, LoggingConfig};
pub use error::{PawpassError, Result};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main().
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "pawpass=debug")
/// - `PAWPASS_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("PAWPASS_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
