//! Handler for the `check` command.

use std::path::Path;

use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::{operator, output, paths};
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::Config;
use crate::port::inbound::operator::SafetyOperator;

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "Account")]
    key: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Broker")]
    broker: String,
    #[tabled(rename = "Credentials")]
    credential_env: String,
    #[tabled(rename = "Symbols")]
    symbols: String,
    #[tabled(rename = "Copies")]
    copies: String,
}

fn rows(config: &Config) -> Result<Vec<AccountRow>> {
    config
        .accounts
        .iter()
        .map(|entry| -> Result<AccountRow> {
            let account = entry.to_account()?;
            let copies = if account.role.is_master() {
                "-".to_string()
            } else if !entry.copy_master {
                "no".to_string()
            } else {
                match entry.risk_ceiling_pct {
                    Some(ceiling) => format!("yes (ceiling {ceiling})"),
                    None => "yes".to_string(),
                }
            };
            Ok(AccountRow {
                key: account.key.to_string(),
                role: account.role.to_string(),
                broker: account.broker.clone(),
                credential_env: entry.credential_env(),
                symbols: entry.symbols.join(", "),
                copies,
            })
        })
        .collect()
}

/// Validate the configuration and the persisted safety record.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = operator::load_config(config_path)?;
    let locations = paths::locations(&config);
    let status = bootstrap::offline_controller(&config, &locations.data_dir)?.status()?;
    let accounts = rows(&config)?;

    if output::is_json() {
        let accounts: Vec<_> = accounts
            .iter()
            .map(|row| {
                json!({
                    "account": row.key,
                    "role": row.role,
                    "broker": row.broker,
                    "credential_env": row.credential_env,
                })
            })
            .collect();
        output::json_output(json!({
            "command": "check",
            "status": "ok",
            "config": config_path.display().to_string(),
            "data_dir": locations.data_dir.display().to_string(),
            "state": status.state,
            "trading_enabled": status.trading_enabled,
            "accounts": accounts,
        }));
        return Ok(());
    }

    output::section("Configuration Check");
    output::field("Config", config_path.display());
    output::success("Configuration file is valid");

    output::section("Accounts");
    output::lines(&Table::new(&accounts).to_string());
    if !config.replication.enabled {
        output::warning("Replication is disabled; users trade independently");
    }

    output::section("Safety record");
    output::field("Data dir", locations.data_dir.display());
    output::field("State", output::state(status.state));
    if !status.trading_enabled {
        output::warning(&format!(
            "Trading disabled: {}",
            status.disabled_reason.as_deref().unwrap_or("no reason")
        ));
        output::hint("run `warden enable-trading` to lift the switch");
    }

    output::success("Configuration check complete");
    Ok(())
}
