//! Input validation for plans.
//!
//! Every failure names the offending field so a caller can show it next to
//! the right input.

use super::error::BillingError;
use super::plans::Plan;

/// Minimum length for plan IDs.
const MIN_PLAN_ID_LENGTH: usize = 3;

/// Maximum length for plan IDs.
const MAX_PLAN_ID_LENGTH: usize = 64;

/// Minimum length for plan names.
const MIN_PLAN_NAME_LENGTH: usize = 3;

/// Maximum length for plan names.
const MAX_PLAN_NAME_LENGTH: usize = 128;

/// Validate a plan ID.
///
/// Plan IDs must:
/// - Be between 3 and 64 characters
/// - Contain only alphanumeric characters, underscores, and hyphens
///
/// # Errors
///
/// Returns `BillingError::Validation` on the `plan_id` field.
pub fn validate_plan_id(id: &str) -> Result<(), BillingError> {
    let len = id.chars().count();
    if len < MIN_PLAN_ID_LENGTH {
        return Err(BillingError::validation(
            "plan_id",
            format!("must be at least {} characters", MIN_PLAN_ID_LENGTH),
        ));
    }

    if len > MAX_PLAN_ID_LENGTH {
        return Err(BillingError::validation(
            "plan_id",
            format!("exceeds maximum length of {}", MAX_PLAN_ID_LENGTH),
        ));
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(BillingError::validation(
            "plan_id",
            "contains invalid characters (only alphanumeric, underscore, and hyphen allowed)",
        ));
    }

    Ok(())
}

/// Validate every field of a plan.
///
/// # Errors
///
/// Returns `BillingError::Validation` for the first invalid field.
pub fn validate_plan(plan: &Plan) -> Result<(), BillingError> {
    validate_plan_id(&plan.id)?;

    let name_len = plan.name.trim().chars().count();
    if name_len < MIN_PLAN_NAME_LENGTH {
        return Err(BillingError::validation(
            "name",
            format!("must be at least {} characters", MIN_PLAN_NAME_LENGTH),
        ));
    }
    if name_len > MAX_PLAN_NAME_LENGTH {
        return Err(BillingError::validation(
            "name",
            format!("exceeds maximum length of {}", MAX_PLAN_NAME_LENGTH),
        ));
    }

    if plan.price < 0 {
        return Err(BillingError::validation("price", "cannot be negative"));
    }

    if plan.features.is_empty() {
        return Err(BillingError::validation("features", "at least one feature is required"));
    }
    if plan.features.iter().any(|f| f.trim().is_empty()) {
        return Err(BillingError::validation("features", "features cannot be blank"));
    }

    if plan.max_walks < -1 {
        return Err(BillingError::validation(
            "max_walks",
            "must be -1 (unlimited) or greater",
        ));
    }

    if plan.discount_percentage > 100 {
        return Err(BillingError::validation(
            "discount_percentage",
            "must be between 0 and 100",
        ));
    }

    Ok(())
}
