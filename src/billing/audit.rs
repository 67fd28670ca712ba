//! Audit logging for billing operations.
//!
//! Provides a trait-based audit logging system for plan changes and
//! subscription transitions. Every state change the engine commits emits
//! exactly one event.

use std::fmt;

/// Audit event types for billing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingAuditEvent {
    /// Plan created.
    PlanCreated { plan_id: String, is_active: bool },
    /// Plan fields changed.
    PlanUpdated { plan_id: String },
    /// Plan activation flipped.
    PlanActivationChanged { plan_id: String, is_active: bool },
    /// Plan deleted.
    PlanDeleted { plan_id: String },
    /// Subscription moved to a new plan.
    TransitionCommitted {
        user_id: String,
        from_plan: String,
        to_plan: String,
        kind: String,
        amount_due: i64,
    },
    /// Downgrade recorded for when the current plan expires.
    DowngradeScheduled {
        user_id: String,
        from_plan: String,
        to_plan: String,
        credit: i64,
    },
    /// Pending downgrade applied after expiry.
    DowngradeApplied {
        user_id: String,
        plan_id: String,
        credit: i64,
    },
    /// Subscription suspended by an administrator.
    SubscriptionSuspended { user_id: String },
    /// Subscription reinstated by an administrator.
    SubscriptionReinstated { user_id: String },
}

impl BillingAuditEvent {
    /// Get the event kind as a string for structured logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlanCreated { .. } => "plan_created",
            Self::PlanUpdated { .. } => "plan_updated",
            Self::PlanActivationChanged { .. } => "plan_activation_changed",
            Self::PlanDeleted { .. } => "plan_deleted",
            Self::TransitionCommitted { .. } => "transition_committed",
            Self::DowngradeScheduled { .. } => "downgrade_scheduled",
            Self::DowngradeApplied { .. } => "downgrade_applied",
            Self::SubscriptionSuspended { .. } => "subscription_suspended",
            Self::SubscriptionReinstated { .. } => "subscription_reinstated",
        }
    }
}

impl fmt::Display for BillingAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlanCreated { plan_id, is_active } => {
                write!(f, "Plan created: plan={}, active={}", plan_id, is_active)
            }
            Self::PlanUpdated { plan_id } => {
                write!(f, "Plan updated: plan={}", plan_id)
            }
            Self::PlanActivationChanged { plan_id, is_active } => {
                write!(f, "Plan activation changed: plan={}, active={}", plan_id, is_active)
            }
            Self::PlanDeleted { plan_id } => {
                write!(f, "Plan deleted: plan={}", plan_id)
            }
            Self::TransitionCommitted { user_id, from_plan, to_plan, kind, amount_due } => {
                write!(
                    f,
                    "Transition committed: user={}, from={}, to={}, kind={}, amount={}",
                    user_id, from_plan, to_plan, kind, amount_due
                )
            }
            Self::DowngradeScheduled { user_id, from_plan, to_plan, credit } => {
                write!(
                    f,
                    "Downgrade scheduled: user={}, from={}, to={}, credit={}",
                    user_id, from_plan, to_plan, credit
                )
            }
            Self::DowngradeApplied { user_id, plan_id, credit } => {
                write!(f, "Downgrade applied: user={}, plan={}, credit={}", user_id, plan_id, credit)
            }
            Self::SubscriptionSuspended { user_id } => {
                write!(f, "Subscription suspended: user={}", user_id)
            }
            Self::SubscriptionReinstated { user_id } => {
                write!(f, "Subscription reinstated: user={}", user_id)
            }
        }
    }
}

/// Trait for audit logging backends.
///
/// Implement this trait to integrate with your logging system (e.g., database,
/// external service, file-based logging).
#[allow(async_fn_in_trait)]
pub trait BillingAuditLogger: Send + Sync {
    /// Log a billing audit event.
    ///
    /// Implementations should handle failures themselves; an audit failure
    /// never undoes a committed change.
    async fn log(&self, event: BillingAuditEvent);
}

/// No-op audit logger that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

impl BillingAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: BillingAuditEvent) {}
}

/// Tracing-based audit logger.
///
/// Logs audit events using the `tracing` crate at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl BillingAuditLogger for TracingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        tracing::info!(
            target: "pawpass::billing::audit",
            event_type = %event.kind(),
            "{}", event
        );
    }
}
