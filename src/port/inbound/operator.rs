//! Operator-facing status projection and manual overrides.
//!
//! Implemented by the live orchestrator and by the offline controller that
//! edits the durable safety record while the process is stopped.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountKey, SafetyLevel, SafetyState, TransitionRecord};
use crate::error::Result;

/// Connection health of one account as seen by its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Worker not started or no cycle completed yet.
    #[default]
    Pending,
    Connected,
    /// Last cycle hit errors but the broker still answers.
    Degraded,
    /// Entries are blocked by the safety machine.
    Blocked,
    /// Balance could not be read in the last cycle.
    Disconnected,
    Stopped,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Connected => "connected",
            Self::Degraded => "degraded",
            Self::Blocked => "blocked",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Per-account status row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub account: AccountKey,
    pub role: String,
    pub broker: String,
    pub connection: ConnectionState,
    /// Account-scoped state, before combining with the global state.
    pub scoped_state: SafetyState,
    /// The state that actually gates this account.
    pub effective_state: SafetyState,
    pub safety_level: Option<SafetyLevel>,
    pub balance: Option<Decimal>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub orders_submitted: u64,
    pub consecutive_errors: u32,
    /// Failures recorded against this account since the last reset.
    pub failure_count: u64,
    pub last_error: Option<String>,
    pub last_block_reason: Option<String>,
}

/// Whole-controller status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub state: SafetyState,
    /// Level of the master account's latest assessment.
    pub safety_level: Option<SafetyLevel>,
    pub trading_enabled: bool,
    pub disabled_reason: Option<String>,
    pub failure_count: u64,
    pub accounts: Vec<AccountStatus>,
    pub recent_transitions: Vec<TransitionRecord>,
    pub updated_at: DateTime<Utc>,
}

impl ControllerStatus {
    /// Row for one account.
    #[must_use]
    pub fn account(&self, key: &AccountKey) -> Option<&AccountStatus> {
        self.accounts.iter().find(|a| &a.account == key)
    }
}

/// Capabilities exposed to operators.
pub trait SafetyOperator {
    /// Current status snapshot.
    fn status(&self) -> Result<ControllerStatus>;

    /// Request a global transition. Still subject to the transition table.
    fn force_transition(&self, target: SafetyState, reason: &str) -> Result<()>;

    /// Lift the operator trading switch.
    fn enable_trading(&self) -> Result<()>;

    /// Block entries and modifications until re-enabled. Exits stay allowed.
    fn disable_trading(&self, reason: &str) -> Result<()>;
}
