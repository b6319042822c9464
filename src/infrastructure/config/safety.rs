//! Capital-safety thresholds and failure escalation.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::safety::{EscalationThresholds, SafetyLimits};
use crate::domain::{CapitalThresholds, LevelBand};

/// Safety configuration. Percentages are in percent units.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub safe: LevelBand,
    pub caution: LevelBand,
    pub warning: LevelBand,
    pub critical_balance_pct: Decimal,
    pub critical_drawdown_pct: Decimal,
    pub max_open_positions: usize,
    /// Failure count that moves the global state to DEGRADED.
    pub degraded_after: u64,
    pub safe_mode_after: u64,
    pub emergency_halt_after: u64,
    /// Transitions kept in the persisted history.
    pub history_limit: usize,
    /// Failures kept in the persisted log.
    pub failure_log_limit: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        let capital = CapitalThresholds::default();
        let escalation = EscalationThresholds::default();
        let limits = SafetyLimits::default();
        Self {
            safe: capital.safe,
            caution: capital.caution,
            warning: capital.warning,
            critical_balance_pct: capital.critical_balance_pct,
            critical_drawdown_pct: capital.critical_drawdown_pct,
            max_open_positions: capital.max_open_positions,
            degraded_after: escalation.degraded,
            safe_mode_after: escalation.safe_mode,
            emergency_halt_after: escalation.emergency_halt,
            history_limit: limits.history_limit,
            failure_log_limit: limits.failure_log_limit,
        }
    }
}

impl SafetyConfig {
    #[must_use]
    pub fn capital(&self) -> CapitalThresholds {
        CapitalThresholds {
            safe: self.safe,
            caution: self.caution,
            warning: self.warning,
            critical_balance_pct: self.critical_balance_pct,
            critical_drawdown_pct: self.critical_drawdown_pct,
            max_open_positions: self.max_open_positions,
        }
    }
}

impl From<&SafetyConfig> for SafetyLimits {
    fn from(config: &SafetyConfig) -> Self {
        Self {
            capital: config.capital(),
            escalation: EscalationThresholds {
                degraded: config.degraded_after,
                safe_mode: config.safe_mode_after,
                emergency_halt: config.emergency_halt_after,
            },
            history_limit: config.history_limit,
            failure_log_limit: config.failure_log_limit,
        }
    }
}
