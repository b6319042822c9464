//! Copy-trade sizing and per-subscriber outcomes.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::AccountKey;
use super::order::OrderSide;

/// A scaled order bound for one subscriber. Lives for one fan-out pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationOrder {
    pub source_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub master_notional: Decimal,
    pub target_account: AccountKey,
    pub scaled_notional: Decimal,
    /// Fraction of the user's balance, e.g. `0.10`.
    pub risk_ceiling_pct: Decimal,
    pub capped: bool,
}

/// Result of proportional sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledSize {
    /// `master_notional * user_balance / master_balance`.
    pub proportional: Decimal,
    /// `user_balance * ceiling`.
    pub ceiling: Decimal,
    /// The smaller of the two.
    pub notional: Decimal,
    pub capped: bool,
}

/// Size a replicated order: `min(F * r, balance * ceiling)`.
///
/// Returns `None` when the master balance is not positive, since the ratio
/// is undefined.
#[must_use]
pub fn scale_notional(
    master_notional: Decimal,
    master_balance_at_fill: Decimal,
    user_balance: Decimal,
    risk_ceiling_pct: Decimal,
) -> Option<ScaledSize> {
    if master_balance_at_fill <= Decimal::ZERO {
        return None;
    }
    let user_balance = user_balance.max(Decimal::ZERO);
    let proportional = master_notional * user_balance / master_balance_at_fill;
    let ceiling = user_balance * risk_ceiling_pct;
    let capped = proportional > ceiling;
    Some(ScaledSize {
        proportional,
        ceiling,
        notional: if capped { ceiling } else { proportional },
        capped,
    })
}

/// Per-subscriber status for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationStatus {
    Filled,
    /// Filled at the risk ceiling instead of the proportional size.
    Capped,
    Skipped,
    Failed,
}

impl fmt::Display for ReplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Filled => "filled",
            Self::Capped => "capped",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationResult {
    pub user_id: AccountKey,
    pub status: ReplicationStatus,
    pub scaled_notional: Decimal,
    pub reason: String,
    /// Broker order id when a replicated order was placed.
    pub order_id: Option<String>,
}

/// Aggregate counts for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationSummary {
    pub pass_id: String,
    pub source_order_id: String,
    pub filled: usize,
    pub capped: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_notional: Decimal,
}

impl ReplicationSummary {
    /// One or more subscribers failed. The master fill is unaffected.
    #[must_use]
    pub const fn is_partial_failure(&self) -> bool {
        self.failed > 0
    }

    #[must_use]
    pub const fn subscribers(&self) -> usize {
        self.filled + self.capped + self.skipped + self.failed
    }
}

/// Full output of a replication pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationReport {
    pub results: Vec<ReplicationResult>,
    pub summary: ReplicationSummary,
}

impl ReplicationReport {
    #[must_use]
    pub fn new(
        pass_id: impl Into<String>,
        source_order_id: impl Into<String>,
        results: Vec<ReplicationResult>,
    ) -> Self {
        let mut summary = ReplicationSummary {
            pass_id: pass_id.into(),
            source_order_id: source_order_id.into(),
            ..ReplicationSummary::default()
        };
        for result in &results {
            match result.status {
                ReplicationStatus::Filled => summary.filled += 1,
                ReplicationStatus::Capped => summary.capped += 1,
                ReplicationStatus::Skipped => summary.skipped += 1,
                ReplicationStatus::Failed => summary.failed += 1,
            }
            if matches!(
                result.status,
                ReplicationStatus::Filled | ReplicationStatus::Capped
            ) {
                summary.total_notional += result.scaled_notional;
            }
        }
        Self { results, summary }
    }

    /// Result for one subscriber.
    #[must_use]
    pub fn result_for(&self, user: &AccountKey) -> Option<&ReplicationResult> {
        self.results.iter().find(|r| &r.user_id == user)
    }
}
