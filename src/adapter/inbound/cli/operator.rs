//! Handlers for the manual override commands.
//!
//! Overrides edit the durable safety record through the same state machine
//! the controller uses, so the transition table still applies.

use std::path::Path;

use chrono::Utc;
use serde_json::json;

use crate::adapter::inbound::cli::command::{DisableTradingArgs, ForceTransitionArgs};
use crate::adapter::inbound::cli::{output, paths};
use crate::application::offline::OfflineController;
use crate::application::status::StatusFile;
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::Config;
use crate::port::inbound::operator::SafetyOperator;

/// Load and validate the configuration at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    Config::load(path)
}

fn open(config: &Config) -> Result<OfflineController> {
    let locations = paths::locations(config);
    warn_if_running(config, locations.status_file.as_deref());
    bootstrap::offline_controller(config, &locations.data_dir)
}

/// Whether `file` was refreshed recently enough to belong to a live process.
#[must_use]
pub fn is_fresh(config: &Config, file: &StatusFile) -> bool {
    let window = chrono::Duration::milliseconds(
        i64::try_from(config.orchestrator.status_interval_ms.saturating_mul(3))
            .unwrap_or(i64::MAX),
    );
    Utc::now() - file.updated_at < window
}

/// A running controller keeps its own copy of the record in memory and
/// would overwrite an offline edit on its next change.
fn warn_if_running(config: &Config, status_file: Option<&Path>) {
    let Some(path) = status_file else {
        return;
    };
    let Ok(Some(file)) = StatusFile::read(path) else {
        return;
    };
    if is_fresh(config, &file) {
        output::warning(&format!(
            "A controller (pid {}) appears to be running; stop it before editing the safety record",
            file.pid
        ));
    }
}

fn report(action: &str, operator: &OfflineController) -> Result<()> {
    let status = operator.status()?;
    if output::is_json() {
        output::json_output(json!({
            "command": action,
            "status": "ok",
            "state": status.state,
            "trading_enabled": status.trading_enabled,
            "disabled_reason": status.disabled_reason,
        }));
        return Ok(());
    }
    output::field("State", output::state(status.state));
    output::field(
        "Trading",
        if status.trading_enabled {
            "enabled".to_string()
        } else {
            format!(
                "disabled ({})",
                status.disabled_reason.as_deref().unwrap_or("no reason")
            )
        },
    );
    Ok(())
}

/// Execute `force-transition`.
pub fn force_transition(args: &ForceTransitionArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let operator = open(&config)?;
    operator.force_transition(args.state, &args.reason)?;
    if !output::is_json() {
        output::success(&format!("Transitioned to {}", args.state));
    }
    report("force-transition", &operator)
}

/// Execute `enable-trading`.
pub fn enable_trading(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let operator = open(&config)?;
    operator.enable_trading()?;
    if !output::is_json() {
        output::success("Trading enabled");
    }
    report("enable-trading", &operator)
}

/// Execute `disable-trading`.
pub fn disable_trading(args: &DisableTradingArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let operator = open(&config)?;
    operator.disable_trading(&args.reason)?;
    if !output::is_json() {
        output::success("Trading disabled; exits remain allowed");
    }
    report("disable-trading", &operator)
}
