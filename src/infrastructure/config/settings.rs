//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all controller
//! settings. Secrets never appear in the file: each account names the
//! environment variable that holds its credentials.
//!
//! # Example
//!
//! ```no_run
//! use warden::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("warden.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;

use super::account::{AccountConfig, PaperConfig, RoleKind, SUPPORTED_BROKERS};
use super::logging::LoggingConfig;
use super::orchestrator::OrchestratorConfig;
use super::replication::ReplicationConfig;
use super::safety::SafetyConfig;
use super::sequence::SequenceConfig;
use crate::domain::AccountKey;
use crate::error::{ConfigError, Result};

/// Main controller configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Root of the durable state store. Defaults to `~/.warden/state`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Where the running controller writes its status JSON.
    ///
    /// Defaults to `~/.warden/status.json`.
    #[serde(default)]
    pub status_file: Option<PathBuf>,

    #[serde(default)]
    pub sequence: SequenceConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub replication: ReplicationConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub paper: PaperConfig,

    /// Exactly one master plus any number of users.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
    .into()
}

fn check_ceiling(field: &'static str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO || value > Decimal::ONE {
        return Err(invalid(field, "must be greater than 0 and at most 1"));
    }
    Ok(())
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML content is malformed
    /// - Validation fails (e.g., two masters, a ceiling above 1)
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    ///
    /// Checks account layout, broker kinds, and that every threshold and
    /// timing is within range.
    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        self.validate_accounts()?;
        self.validate_safety()?;

        check_ceiling("replication.risk_ceiling_pct", self.replication.risk_ceiling_pct)?;
        if self.replication.min_notional < Decimal::ZERO {
            return Err(invalid("replication.min_notional", "must be 0 or greater"));
        }

        let seq = &self.sequence;
        if seq.max_attempts == 0 {
            return Err(invalid("sequence.max_attempts", "must be greater than 0"));
        }
        if seq.transient_max_attempts == 0 {
            return Err(invalid(
                "sequence.transient_max_attempts",
                "must be greater than 0",
            ));
        }
        if seq.jump_margin_micros == 0 {
            return Err(invalid("sequence.jump_margin_micros", "must be greater than 0"));
        }
        if seq.max_delay_ms < seq.base_delay_ms {
            return Err(invalid("sequence.max_delay_ms", "must be >= base_delay_ms"));
        }
        if seq.request_timeout_ms == 0 {
            return Err(invalid("sequence.request_timeout_ms", "must be greater than 0"));
        }

        let orch = &self.orchestrator;
        if orch.cycle_interval_ms == 0 {
            return Err(invalid(
                "orchestrator.cycle_interval_ms",
                "must be greater than 0",
            ));
        }
        if orch.shutdown_timeout_ms == 0 {
            return Err(invalid(
                "orchestrator.shutdown_timeout_ms",
                "must be greater than 0",
            ));
        }
        if orch.status_interval_ms == 0 {
            return Err(invalid(
                "orchestrator.status_interval_ms",
                "must be greater than 0",
            ));
        }

        if let Some((symbol, _)) = self.paper.prices.iter().find(|(_, p)| **p <= Decimal::ZERO) {
            return Err(invalid(
                "paper.prices",
                format!("price for {symbol} must be greater than 0"),
            ));
        }
        Ok(())
    }

    fn validate_accounts(&self) -> Result<()> {
        let masters = self
            .accounts
            .iter()
            .filter(|a| a.role == RoleKind::Master)
            .count();
        if masters != 1 {
            return Err(invalid(
                "accounts",
                format!("exactly one master account is required, found {masters}"),
            ));
        }

        let mut keys = HashSet::new();
        for account in &self.accounts {
            let key = AccountKey::for_role(&account.role()).map_err(|e| {
                invalid("accounts.id", e.to_string())
            })?;
            if !keys.insert(key.clone()) {
                return Err(invalid(
                    "accounts.id",
                    format!("duplicate account key {key}"),
                ));
            }
            if !SUPPORTED_BROKERS.contains(&account.broker.as_str()) {
                return Err(invalid(
                    "accounts.broker",
                    format!(
                        "unsupported broker '{}' for {key} (supported: {})",
                        account.broker,
                        SUPPORTED_BROKERS.join(", ")
                    ),
                ));
            }
            if let Some(ceiling) = account.risk_ceiling_pct {
                check_ceiling("accounts.risk_ceiling_pct", ceiling)?;
            }
            if account.paper_balance < Decimal::ZERO {
                return Err(invalid("accounts.paper_balance", "must be 0 or greater"));
            }
        }
        Ok(())
    }

    fn validate_safety(&self) -> Result<()> {
        let safety = &self.safety;
        if let Some(reason) = safety.capital().ordering_violation() {
            return Err(invalid("safety", reason));
        }
        let hundred = Decimal::ONE_HUNDRED;
        if safety.critical_balance_pct < Decimal::ZERO || safety.critical_balance_pct > hundred {
            return Err(invalid("safety.critical_balance_pct", "must be between 0 and 100"));
        }
        if safety.critical_drawdown_pct < Decimal::ZERO || safety.critical_drawdown_pct > hundred
        {
            return Err(invalid(
                "safety.critical_drawdown_pct",
                "must be between 0 and 100",
            ));
        }
        if !(0 < safety.degraded_after
            && safety.degraded_after <= safety.safe_mode_after
            && safety.safe_mode_after <= safety.emergency_halt_after)
        {
            return Err(invalid(
                "safety.failure_thresholds",
                "must be ordered 0 < degraded_after <= safe_mode_after <= emergency_halt_after",
            ));
        }
        if safety.history_limit == 0 {
            return Err(invalid("safety.history_limit", "must be greater than 0"));
        }
        if safety.failure_log_limit == 0 {
            return Err(invalid("safety.failure_log_limit", "must be greater than 0"));
        }
        Ok(())
    }

    /// The master's account entry.
    #[must_use]
    pub fn master(&self) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.role == RoleKind::Master)
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
