//! Copy-trade replication configuration.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::replication::ReplicationSettings;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub enabled: bool,
    /// Fraction of a user's balance one replicated order may use (0.10 = 10%).
    pub risk_ceiling_pct: Decimal,
    /// Scaled orders below this notional are skipped.
    pub min_notional: Decimal,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        let settings = ReplicationSettings::default();
        Self {
            enabled: settings.enabled,
            risk_ceiling_pct: settings.risk_ceiling_pct,
            min_notional: settings.min_notional,
        }
    }
}

impl From<&ReplicationConfig> for ReplicationSettings {
    fn from(config: &ReplicationConfig) -> Self {
        Self {
            enabled: config.enabled,
            risk_ceiling_pct: config.risk_ceiling_pct,
            min_notional: config.min_notional,
        }
    }
}
