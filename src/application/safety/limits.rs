//! Tunable limits for the safety machine.

use crate::domain::{CapitalThresholds, SafetyState};

/// Failure counts at which the global state escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationThresholds {
    pub degraded: u64,
    pub safe_mode: u64,
    pub emergency_halt: u64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            degraded: 2,
            safe_mode: 5,
            emergency_halt: 10,
        }
    }
}

impl EscalationThresholds {
    /// Most severe state whose threshold `count` has reached.
    #[must_use]
    pub const fn target_for(&self, count: u64) -> Option<SafetyState> {
        if count >= self.emergency_halt {
            Some(SafetyState::EmergencyHalt)
        } else if count >= self.safe_mode {
            Some(SafetyState::SafeMode)
        } else if count >= self.degraded {
            Some(SafetyState::Degraded)
        } else {
            None
        }
    }
}

/// Everything the machine needs besides its store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyLimits {
    pub capital: CapitalThresholds,
    pub escalation: EscalationThresholds,
    /// Transition records kept in the persisted history.
    pub history_limit: usize,
    /// Failure records kept in the persisted log.
    pub failure_log_limit: usize,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            capital: CapitalThresholds::default(),
            escalation: EscalationThresholds::default(),
            history_limit: 200,
            failure_log_limit: 100,
        }
    }
}
