use crate::billing::BillingError;

/// The main error type for Pawpass.
///
/// Domain failures travel as [`BillingError`] so callers can match on the
/// exact rejection; the remaining variants cover the persistence boundary
/// and configuration.
#[derive(Debug, thiserror::Error)]
pub enum PawpassError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PawpassError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// The billing error behind this error, if any.
    #[must_use]
    pub fn as_billing(&self) -> Option<&BillingError> {
        match self {
            Self::Billing(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the caller should re-run the whole classify and commit sequence.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.as_billing().is_some_and(BillingError::is_retryable)
    }
}

/// Result type alias for Pawpass operations
pub type Result<T> = std::result::Result<T, PawpassError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_error_is_transparent() {
        let err: PawpassError = BillingError::PlanNotFound {
            plan_id: "gold".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Plan not found: gold");
        assert!(matches!(
            err.as_billing(),
            Some(BillingError::PlanNotFound { .. })
        ));
    }

    #[test]
    fn test_retryable_only_for_conflicts() {
        let conflict: PawpassError = BillingError::ConcurrentModification {
            user_id: "user_1".to_string(),
        }
        .into();
        assert!(conflict.is_retryable());

        let storage = PawpassError::storage("connection reset");
        assert!(!storage.is_retryable());
        assert_eq!(storage.to_string(), "Storage error: connection reset");
    }
}
