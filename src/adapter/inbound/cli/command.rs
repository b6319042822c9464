//! Command-line interface definitions.
//!
//! Defines the CLI structure for the warden controller using `clap`.
//! Operators start the controller in the foreground, inspect its status,
//! validate configuration, and apply manual safety overrides.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::paths;
use crate::domain::SafetyState;

/// Multi-account execution and capital-safety controller
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about)]
pub struct Cli {
    /// Color output mode [auto, always, never]
    #[arg(
        long,
        global = true,
        default_value = "auto",
        hide_possible_values = true
    )]
    pub color: ColorChoice,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Color output mode for terminal rendering.
#[derive(Clone, Debug, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect automatically
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Top-level subcommands for the warden CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller in the foreground until interrupted
    Run(RunArgs),

    /// Show controller, safety, and per-account status
    Status(StatusArgs),

    /// Validate a configuration file and the persisted safety record
    Check(ConfigPathArg),

    /// Request a global safety transition (subject to the transition table)
    ForceTransition(ForceTransitionArgs),

    /// Lift the operator trading switch
    EnableTrading(ConfigPathArg),

    /// Block entries and modifications; exits stay allowed
    DisableTrading(DisableTradingArgs),
}

/// Shared argument struct for commands that require only a configuration path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value_os_t = paths::default_config())]
    pub config: PathBuf,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value_os_t = paths::default_config())]
    pub config: PathBuf,

    /// Override the configured log level (e.g. debug, warden=trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value_os_t = paths::default_config())]
    pub config: PathBuf,

    /// Read this status file instead of the configured one.
    #[arg(long)]
    pub status_file: Option<PathBuf>,
}

/// Arguments for the `force-transition` subcommand.
#[derive(Parser, Debug)]
pub struct ForceTransitionArgs {
    /// Target state (NORMAL, DEGRADED, RECOVERY, SAFE_MODE, EMERGENCY_HALT).
    pub state: SafetyState,

    /// Reason recorded in the transition history.
    #[arg(short, long)]
    pub reason: String,

    /// Path to the configuration file.
    #[arg(short, long, default_value_os_t = paths::default_config())]
    pub config: PathBuf,
}

/// Arguments for the `disable-trading` subcommand.
#[derive(Parser, Debug)]
pub struct DisableTradingArgs {
    /// Reason shown in status and returned with blocked decisions.
    #[arg(short, long)]
    pub reason: String,

    /// Path to the configuration file.
    #[arg(short, long, default_value_os_t = paths::default_config())]
    pub config: PathBuf,
}
