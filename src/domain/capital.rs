//! Capital snapshots and safety-level classification.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::safety::SafetyLevel;

/// Lower bound on remaining balance and upper bound on drawdown for a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBand {
    pub min_balance_pct: Decimal,
    pub max_drawdown_pct: Decimal,
}

impl LevelBand {
    #[must_use]
    pub const fn new(min_balance_pct: Decimal, max_drawdown_pct: Decimal) -> Self {
        Self {
            min_balance_pct,
            max_drawdown_pct,
        }
    }

    fn contains(&self, balance_pct: Decimal, drawdown_pct: Decimal) -> bool {
        balance_pct >= self.min_balance_pct && drawdown_pct <= self.max_drawdown_pct
    }
}

/// Thresholds for mapping capital metrics to a [`SafetyLevel`].
///
/// All percentages are in percent units (`90` means 90%). DANGER has no
/// band of its own: it is whatever is outside WARNING and not CRITICAL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapitalThresholds {
    pub safe: LevelBand,
    pub caution: LevelBand,
    pub warning: LevelBand,
    /// Remaining balance strictly below this is CRITICAL.
    pub critical_balance_pct: Decimal,
    /// Drawdown strictly above this is CRITICAL.
    pub critical_drawdown_pct: Decimal,
    /// More open positions than this lifts the level to at least WARNING.
    pub max_open_positions: usize,
}

impl Default for CapitalThresholds {
    fn default() -> Self {
        Self {
            safe: LevelBand::new(dec!(90), dec!(10)),
            caution: LevelBand::new(dec!(70), dec!(20)),
            warning: LevelBand::new(dec!(60), dec!(25)),
            critical_balance_pct: dec!(50),
            critical_drawdown_pct: dec!(40),
            max_open_positions: 20,
        }
    }
}

impl CapitalThresholds {
    /// Classify capital metrics.
    ///
    /// CRITICAL overrides every band. Metrics outside the WARNING band
    /// are DANGER. The result never gets safer as balance falls, drawdown
    /// rises, or position count rises.
    #[must_use]
    pub fn classify(
        &self,
        balance_remaining_pct: Decimal,
        position_count: usize,
        drawdown_pct: Decimal,
    ) -> SafetyLevel {
        if balance_remaining_pct < self.critical_balance_pct
            || drawdown_pct > self.critical_drawdown_pct
        {
            return SafetyLevel::Critical;
        }

        let by_capital = if self.safe.contains(balance_remaining_pct, drawdown_pct) {
            SafetyLevel::Safe
        } else if self.caution.contains(balance_remaining_pct, drawdown_pct) {
            SafetyLevel::Caution
        } else if self.warning.contains(balance_remaining_pct, drawdown_pct) {
            SafetyLevel::Warning
        } else {
            SafetyLevel::Danger
        };

        if position_count > self.max_open_positions {
            by_capital.max(SafetyLevel::Warning)
        } else {
            by_capital
        }
    }

    /// Reasons the bands are not monotone, if any.
    #[must_use]
    pub fn ordering_violation(&self) -> Option<&'static str> {
        let bands = [self.safe, self.caution, self.warning];
        let balances_descend = bands
            .windows(2)
            .all(|w| w[0].min_balance_pct >= w[1].min_balance_pct)
            && self.warning.min_balance_pct >= self.critical_balance_pct;
        if !balances_descend {
            return Some("min_balance_pct must not increase from safe to critical");
        }
        let drawdowns_ascend = bands
            .windows(2)
            .all(|w| w[0].max_drawdown_pct <= w[1].max_drawdown_pct)
            && self.warning.max_drawdown_pct <= self.critical_drawdown_pct;
        if !drawdowns_ascend {
            return Some("max_drawdown_pct must not decrease from safe to critical");
        }
        None
    }
}

/// Capital metrics for one account at one assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapitalSnapshot {
    pub initial: Decimal,
    pub current: Decimal,
    pub peak: Decimal,
    pub position_count: usize,
    pub balance_remaining_pct: Decimal,
    pub drawdown_pct: Decimal,
    pub level: SafetyLevel,
    pub assessed_at: DateTime<Utc>,
}

impl CapitalSnapshot {
    /// Snapshot for an account seen for the first time.
    #[must_use]
    pub fn first(balance: Decimal, position_count: usize, thresholds: &CapitalThresholds) -> Self {
        Self::compute(balance, balance, balance, position_count, thresholds)
    }

    /// Roll this snapshot forward with a fresh balance reading.
    ///
    /// An account that had no capital when first seen is rebased on its
    /// first positive balance.
    #[must_use]
    pub fn advance(
        &self,
        balance: Decimal,
        position_count: usize,
        thresholds: &CapitalThresholds,
    ) -> Self {
        if self.initial <= Decimal::ZERO {
            return Self::first(balance, position_count, thresholds);
        }
        let peak = self.peak.max(balance);
        Self::compute(self.initial, balance, peak, position_count, thresholds)
    }

    fn compute(
        initial: Decimal,
        current: Decimal,
        peak: Decimal,
        position_count: usize,
        thresholds: &CapitalThresholds,
    ) -> Self {
        let balance_remaining_pct = percent_of(current, initial);
        let drawdown_pct = if peak > Decimal::ZERO {
            ((peak - current) / peak * dec!(100)).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        let level = thresholds.classify(balance_remaining_pct, position_count, drawdown_pct);
        Self {
            initial,
            current,
            peak,
            position_count,
            balance_remaining_pct,
            drawdown_pct,
            level,
            assessed_at: Utc::now(),
        }
    }
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    part / whole * dec!(100)
}
