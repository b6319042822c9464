//! Handler for the `run` command.

use std::sync::Arc;

use tracing::{error, info};

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::{operator, output, paths};
use crate::adapter::outbound::strategy::HoldStrategy;
use crate::error::{Error, Result};
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::Config;

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs || output::is_json() {
        config.logging.format = "json".to_string();
    }
}

/// Execute the run command.
///
/// Workers run on their own threads; this task only waits for Ctrl-C and
/// then drives the bounded shutdown.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = operator::load_config(&args.config)?;
    apply_overrides(&mut config, args);
    config.init_logging();

    let locations = paths::locations(&config);
    let orchestrator =
        bootstrap::build_orchestrator(&config, &locations, Arc::new(HoldStrategy))?;

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Config", args.config.display());
    output::field("Data dir", locations.data_dir.display());
    output::field("Accounts", orchestrator.workers().len());
    output::field("State", output::state(orchestrator.machine().state()));
    if let Some(path) = &locations.status_file {
        output::field("Status file", path.display());
    }

    orchestrator.start()?;
    info!("Controller running; press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");

    let stopping = Arc::clone(&orchestrator);
    let report = tokio::task::spawn_blocking(move || stopping.shutdown_default())
        .await
        .map_err(|e| Error::Worker(format!("shutdown task failed: {e}")))?;

    if report.is_clean() {
        output::success(&format!("Stopped {} workers", report.joined));
    } else {
        let names: Vec<String> = report.unresponsive.iter().map(ToString::to_string).collect();
        output::warning(&format!(
            "Workers still running after the shutdown timeout: {}",
            names.join(", ")
        ));
    }
    Ok(())
}
