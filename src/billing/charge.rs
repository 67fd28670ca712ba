//! Charge processor seam.
//!
//! The engine never talks to a payment gateway. Callers charge the amount a
//! classification reports and only then commit it. Implement
//! [`ChargeProcessor`] to let [`SubscriptionManager::checkout`] run that
//! sequence for you.
//!
//! [`SubscriptionManager::checkout`]: super::subscription::SubscriptionManager::checkout

use crate::error::Result;

/// Result of a charge attempt the gateway answered.
///
/// Transport failures are reported as `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// Money was taken.
    Approved {
        /// Gateway reference for the charge.
        reference: String,
    },
    /// The gateway refused the charge.
    Declined {
        /// Reason given by the gateway.
        reason: String,
    },
}

/// Trait for payment collection.
///
/// Gateway transport failures can be returned as `anyhow::Error`, which
/// converts into [`PawpassError::Anyhow`](crate::PawpassError::Anyhow).
#[allow(async_fn_in_trait)]
pub trait ChargeProcessor: Send + Sync {
    /// Charge `amount` minor units to a user.
    async fn charge(&self, user_id: &str, amount: i64) -> Result<ChargeOutcome>;
}
