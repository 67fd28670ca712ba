//! Day-rate proration.
//!
//! These figures are informational. Committed downgrade credits use the
//! full price difference, not a prorated amount.

use super::plans::Plan;

/// Price per day of the plan's billing period.
///
/// Forever plans have no period; their rate is the whole price.
#[must_use]
pub fn daily_rate(plan: &Plan) -> f64 {
    match plan.duration.period_days() {
        Some(days) => plan.price as f64 / f64::from(days),
        None => plan.price as f64,
    }
}

/// Difference in cost of spending `days_remaining` days on `new_plan`
/// instead of `current_plan`.
///
/// Positive values are owed by the user, negative values are credit. When
/// either plan is a forever plan the delta is the plain price difference,
/// since no fraction of a period applies.
#[must_use]
pub fn proration_delta(current_plan: &Plan, new_plan: &Plan, days_remaining: u32) -> i64 {
    let has_period =
        current_plan.duration.period_days().is_some() && new_plan.duration.period_days().is_some();
    if !has_period {
        return new_plan.price - current_plan.price;
    }

    let delta = (daily_rate(new_plan) - daily_rate(current_plan)) * f64::from(days_remaining);
    delta.round() as i64
}
