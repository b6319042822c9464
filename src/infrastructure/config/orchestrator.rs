//! Worker pool timings.

use std::time::Duration;

use serde::Deserialize;

use crate::application::orchestrator::OrchestratorSettings;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub cycle_interval_ms: u64,
    /// Delay between consecutive worker starts.
    pub stagger_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub status_interval_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 5_000,
            stagger_ms: 500,
            shutdown_timeout_ms: 15_000,
            status_interval_ms: 5_000,
        }
    }
}

impl From<&OrchestratorConfig> for OrchestratorSettings {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            cycle_interval: Duration::from_millis(config.cycle_interval_ms),
            stagger: Duration::from_millis(config.stagger_ms),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
            status_interval: Duration::from_millis(config.status_interval_ms),
        }
    }
}
