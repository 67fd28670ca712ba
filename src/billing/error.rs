//! Billing-specific error types.
//!
//! Every rejection the lifecycle engine can produce has its own variant so a
//! request handler can map it to a precise response without string matching.

use std::fmt;

/// Billing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    // Validation errors
    /// A plan or subscription field failed validation.
    Validation { field: String, reason: String },

    // Lookup errors
    /// The specified plan was not found.
    PlanNotFound { plan_id: String },
    /// No subscription record exists for the user.
    SubscriptionNotFound { user_id: String },

    // Governance errors
    /// Activating the plan would exceed the active plan quota.
    PlanQuotaExceeded { plan_id: String, active: usize, max: usize },
    /// The plan is referenced by at least one subscription.
    PlanInUse { plan_id: String },
    /// The plan is locked and cannot be mutated.
    PlanLocked { plan_id: String },

    // Subscription errors
    /// The subscription record changed since it was read.
    ConcurrentModification { user_id: String },
    /// The charge processor declined the payment.
    PaymentDeclined { user_id: String, amount: i64 },

    // General errors
    /// An unexpected internal error occurred.
    Internal { message: String },
}

impl BillingError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Check if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. } | Self::Internal { .. })
    }

    /// Check if this error is retryable.
    ///
    /// Only a lost compare-and-set is retryable, and the retry must start
    /// from a fresh read and classification.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
            Self::PlanNotFound { plan_id } => {
                write!(f, "Plan not found: {}", plan_id)
            }
            Self::SubscriptionNotFound { user_id } => {
                write!(f, "No subscription found for '{}'", user_id)
            }
            Self::PlanQuotaExceeded { plan_id, active, max } => {
                write!(
                    f,
                    "Cannot activate plan '{}': {} plans already active (maximum {})",
                    plan_id, active, max
                )
            }
            Self::PlanInUse { plan_id } => {
                write!(f, "Plan '{}' is in use by at least one subscription", plan_id)
            }
            Self::PlanLocked { plan_id } => {
                write!(f, "Plan '{}' is locked and cannot be modified", plan_id)
            }
            Self::ConcurrentModification { user_id } => {
                write!(f, "Concurrent modification detected for '{}', please retry", user_id)
            }
            Self::PaymentDeclined { user_id, amount } => {
                write!(f, "Payment of {} declined for '{}'", amount, user_id)
            }
            Self::Internal { message } => {
                write!(f, "Internal billing error: {}", message)
            }
        }
    }
}

impl std::error::Error for BillingError {}
