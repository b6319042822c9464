//! Safety states, levels, and the transition table.
//!
//! The table here is the only definition of which state changes are legal.
//! [`SafetyState::can_transition_to`] is total over every `(from, to)` pair;
//! anything not listed is rejected.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::AccountKey;
use super::order::TradeOperation;

/// Operating state of the controller (global) or of one account scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyState {
    #[default]
    Normal,
    Degraded,
    Recovery,
    SafeMode,
    EmergencyHalt,
}

impl SafetyState {
    /// Every state, in ascending severity.
    pub const ALL: [Self; 5] = [
        Self::Normal,
        Self::Degraded,
        Self::Recovery,
        Self::SafeMode,
        Self::EmergencyHalt,
    ];

    /// Targets reachable from this state.
    #[must_use]
    pub const fn allowed_targets(self) -> &'static [Self] {
        match self {
            Self::Normal => &[Self::Degraded, Self::SafeMode, Self::EmergencyHalt],
            Self::Degraded => &[
                Self::Normal,
                Self::Recovery,
                Self::SafeMode,
                Self::EmergencyHalt,
            ],
            Self::Recovery => &[
                Self::Normal,
                Self::Degraded,
                Self::SafeMode,
                Self::EmergencyHalt,
            ],
            Self::SafeMode => &[Self::Recovery, Self::EmergencyHalt],
            Self::EmergencyHalt => &[Self::Recovery],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Rank used to decide whether an automatic change tightens safety.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Degraded => 1,
            Self::Recovery => 2,
            Self::SafeMode => 3,
            Self::EmergencyHalt => 4,
        }
    }

    /// The more severe of two states.
    #[must_use]
    pub fn max_severity(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Degraded => "DEGRADED",
            Self::Recovery => "RECOVERY",
            Self::SafeMode => "SAFE_MODE",
            Self::EmergencyHalt => "EMERGENCY_HALT",
        }
    }
}

impl fmt::Display for SafetyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| format!("unknown safety state '{s}'"))
    }
}

/// Capital risk classification, ordered from safest to most dangerous.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyLevel {
    #[default]
    Safe,
    Caution,
    Warning,
    Danger,
    Critical,
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Safe => "SAFE",
            Self::Caution => "CAUTION",
            Self::Warning => "WARNING",
            Self::Danger => "DANGER",
            Self::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Outcome of a `can_trade` check.
///
/// A blocked operation is a value, not an error. `restricted` marks an
/// allowed operation that must only reduce risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub operation: TradeOperation,
    pub allowed: bool,
    pub restricted: bool,
    pub reason: String,
}

impl TradeDecision {
    #[must_use]
    pub fn allow(operation: TradeOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            allowed: true,
            restricted: false,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn restrict(operation: TradeOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            allowed: true,
            restricted: true,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn block(operation: TradeOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            allowed: false,
            restricted: false,
            reason: reason.into(),
        }
    }

    /// The `(allowed, reason)` pair.
    #[must_use]
    pub fn as_tuple(&self) -> (bool, &str) {
        (self.allowed, &self.reason)
    }
}

/// Where a transition applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "account", rename_all = "lowercase")]
pub enum SafetyScope {
    Global,
    Account(AccountKey),
}

impl fmt::Display for SafetyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Account(key) => write!(f, "{key}"),
        }
    }
}

/// One entry in the transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub scope: SafetyScope,
    pub from: SafetyState,
    pub to: SafetyState,
    pub reason: String,
    /// Operator-forced rather than automatic.
    pub forced: bool,
    pub at: DateTime<Utc>,
}
