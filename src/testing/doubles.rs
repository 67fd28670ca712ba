//! Recording test doubles for the engine's collaborators.

use std::sync::{Arc, Mutex};

use crate::billing::{BillingAuditEvent, BillingAuditLogger, ChargeOutcome, ChargeProcessor};
use crate::error::Result;

/// Audit logger that keeps every event in memory.
///
/// Clones share the same event list.
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditLogger {
    events: Arc<Mutex<Vec<BillingAuditEvent>>>,
}

impl RecordingAuditLogger {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far, oldest first.
    pub fn events(&self) -> Vec<BillingAuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl BillingAuditLogger for RecordingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

/// Charge processor that answers every charge the same way and records
/// what it was asked.
#[derive(Debug, Clone)]
pub struct MockChargeProcessor {
    mode: MockChargeMode,
    charges: Arc<Mutex<Vec<(String, i64)>>>,
}

#[derive(Debug, Clone)]
enum MockChargeMode {
    Approve,
    Decline(String),
    Fail(String),
}

impl MockChargeProcessor {
    /// A processor that approves every charge.
    #[must_use]
    pub fn approving() -> Self {
        Self::with_mode(MockChargeMode::Approve)
    }

    /// A processor that declines every charge.
    #[must_use]
    pub fn declining(reason: &str) -> Self {
        Self::with_mode(MockChargeMode::Decline(reason.to_string()))
    }

    /// A processor whose gateway cannot be reached.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self::with_mode(MockChargeMode::Fail(message.to_string()))
    }

    fn with_mode(mode: MockChargeMode) -> Self {
        Self {
            mode,
            charges: Arc::default(),
        }
    }

    /// `(user_id, amount)` of every charge attempted.
    pub fn charges(&self) -> Vec<(String, i64)> {
        self.charges.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ChargeProcessor for MockChargeProcessor {
    async fn charge(&self, user_id: &str, amount: i64) -> Result<ChargeOutcome> {
        let attempt = {
            let mut charges = self.charges.lock().unwrap_or_else(|e| e.into_inner());
            charges.push((user_id.to_string(), amount));
            charges.len()
        };

        match &self.mode {
            MockChargeMode::Approve => Ok(ChargeOutcome::Approved {
                reference: format!("ch_test_{}", attempt),
            }),
            MockChargeMode::Decline(reason) => Ok(ChargeOutcome::Declined {
                reason: reason.clone(),
            }),
            MockChargeMode::Fail(message) => {
                Err(anyhow::anyhow!("charge gateway unreachable: {}", message).into())
            }
        }
    }
}
