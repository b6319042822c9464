//! Handler for the `status` command.
//!
//! Prefers the status file of a running controller. Without one, reports
//! the persisted safety record with every account shown as stopped.

use chrono::{DateTime, Utc};
use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::command::StatusArgs;
use crate::adapter::inbound::cli::{operator, output, paths};
use crate::application::status::StatusFile;
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::port::inbound::operator::{AccountStatus, ControllerStatus, SafetyOperator};

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Connection")]
    connection: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Cycles")]
    cycles: u64,
    #[tabled(rename = "Orders")]
    orders: u64,
    #[tabled(rename = "Failures")]
    failures: u64,
    #[tabled(rename = "Last cycle")]
    last_cycle: String,
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |at| at.format("%H:%M:%S").to_string())
}

fn row(account: &AccountStatus) -> AccountRow {
    let state = if account.scoped_state == account.effective_state {
        account.effective_state.to_string()
    } else {
        format!("{} (own {})", account.effective_state, account.scoped_state)
    };
    AccountRow {
        account: account.account.to_string(),
        connection: account.connection.to_string(),
        state,
        level: account
            .safety_level
            .map_or_else(|| "-".to_string(), |level| level.to_string()),
        balance: account
            .balance
            .map_or_else(|| "-".to_string(), |balance| balance.round_dp(2).to_string()),
        cycles: account.cycles,
        orders: account.orders_submitted,
        failures: account.failure_count,
        last_cycle: format_time(account.last_cycle_at),
    }
}

/// Where the snapshot came from.
enum Source {
    Live {
        pid: u32,
        started_at: DateTime<Utc>,
        fresh: bool,
    },
    Offline,
}

/// Execute the status command.
pub fn execute(args: &StatusArgs) -> Result<()> {
    let config = operator::load_config(&args.config)?;
    let locations = paths::locations(&config);
    let status_path = args
        .status_file
        .clone()
        .or_else(|| locations.status_file.clone())
        .unwrap_or_else(paths::default_status_file);

    let (source, status) = match StatusFile::read(&status_path)? {
        Some(file) => (
            Source::Live {
                pid: file.pid,
                started_at: file.started_at,
                fresh: operator::is_fresh(&config, &file),
            },
            file.controller,
        ),
        None => (
            Source::Offline,
            bootstrap::offline_controller(&config, &locations.data_dir)?.status()?,
        ),
    };

    if output::is_json() {
        let source = match source {
            Source::Live {
                pid,
                started_at,
                fresh,
            } => json!({
                "kind": "status_file",
                "path": status_path.display().to_string(),
                "pid": pid,
                "started_at": started_at,
                "fresh": fresh,
            }),
            Source::Offline => json!({
                "kind": "safety_record",
                "path": locations.data_dir.display().to_string(),
            }),
        };
        output::json_output(json!({
            "command": "status",
            "source": source,
            "controller": status,
        }));
        return Ok(());
    }

    if output::is_quiet() {
        return Ok(());
    }

    output::header(env!("CARGO_PKG_VERSION"));
    match source {
        Source::Live {
            pid,
            started_at,
            fresh,
        } => {
            output::field("Source", status_path.display());
            output::field("Pid", pid);
            output::field("Started", started_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if !fresh {
                output::warning("Status file is stale; the controller is probably stopped");
            }
        }
        Source::Offline => {
            output::field("Source", output::muted("persisted record (controller not running)"));
        }
    }
    display_controller(&status);
    Ok(())
}

fn display_controller(status: &ControllerStatus) {
    output::field("State", output::state(status.state));
    output::field("Capital", output::level(status.safety_level));
    if status.trading_enabled {
        output::field("Trading", "enabled");
    } else {
        output::field(
            "Trading",
            format!(
                "disabled ({})",
                status.disabled_reason.as_deref().unwrap_or("no reason")
            ),
        );
    }
    output::field("Failures", status.failure_count);
    output::field("Updated", status.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));

    output::section("Accounts");
    let rows: Vec<AccountRow> = status.accounts.iter().map(row).collect();
    output::lines(&Table::new(rows).to_string());

    let blocked: Vec<_> = status
        .accounts
        .iter()
        .filter_map(|a| a.last_block_reason.as_ref().map(|r| (&a.account, r)))
        .collect();
    for (account, reason) in blocked {
        output::note(&format!("{account}: blocked ({reason})"));
    }
    if output::verbosity() > 0 {
        for account in &status.accounts {
            if let Some(error) = &account.last_error {
                output::note(&format!("{}: last error {error}", account.account));
            }
        }
    }

    if !status.recent_transitions.is_empty() {
        output::section("Recent transitions");
        for transition in &status.recent_transitions {
            output::lines(&format!(
                "{} {} {} -> {} {}",
                output::muted(transition.at.format("%Y-%m-%d %H:%M:%S")),
                output::highlight(&transition.scope),
                transition.from,
                transition.to,
                output::muted(&transition.reason),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountKey, SafetyState};
    use crate::port::inbound::operator::ConnectionState;
    use rust_decimal_macros::dec;

    fn account(scoped: SafetyState, effective: SafetyState) -> AccountStatus {
        AccountStatus {
            account: AccountKey::master(),
            role: "MASTER".to_string(),
            broker: "paper".to_string(),
            connection: ConnectionState::Connected,
            scoped_state: scoped,
            effective_state: effective,
            safety_level: None,
            balance: Some(dec!(1234.5678)),
            last_cycle_at: None,
            cycles: 7,
            orders_submitted: 2,
            consecutive_errors: 0,
            failure_count: 1,
            last_error: None,
            last_block_reason: None,
        }
    }

    #[test]
    fn row_rounds_balance_and_marks_missing_values() {
        let row = row(&account(SafetyState::Normal, SafetyState::Normal));
        assert_eq!(row.balance, "1234.57");
        assert_eq!(row.level, "-");
        assert_eq!(row.last_cycle, "-");
        assert_eq!(row.state, "NORMAL");
        assert_eq!(row.connection, "connected");
    }

    #[test]
    fn row_shows_own_state_when_global_is_stricter() {
        let row = row(&account(SafetyState::Degraded, SafetyState::EmergencyHalt));
        assert_eq!(row.state, "EMERGENCY_HALT (own DEGRADED)");
    }
}
