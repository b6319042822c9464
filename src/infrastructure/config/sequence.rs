//! Sequence counter and retry configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::application::sequence::policy::DEFAULT_JUMP_MARGIN;
use crate::application::sequence::SequencePolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Minimum spacing between two calls on one account.
    pub min_call_interval_ms: u64,
    /// Counter jump after an invalid-sequence rejection, in microseconds.
    pub jump_margin_micros: u64,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Attempts per call while sequences keep being rejected.
    pub max_attempts: u32,
    /// Attempts per call for transient errors and timeouts.
    pub transient_max_attempts: u32,
    pub request_timeout_ms: u64,
    pub jitter: bool,
    /// Counter file from a single-counter deployment, migrated into the
    /// master's counter once on startup.
    pub legacy_file: Option<PathBuf>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            min_call_interval_ms: 200,
            jump_margin_micros: DEFAULT_JUMP_MARGIN,
            base_delay_ms: 250,
            max_delay_ms: 8_000,
            max_attempts: 5,
            transient_max_attempts: 3,
            request_timeout_ms: 10_000,
            jitter: true,
            legacy_file: None,
        }
    }
}

impl From<&SequenceConfig> for SequencePolicy {
    fn from(config: &SequenceConfig) -> Self {
        Self {
            jump_margin: config.jump_margin_micros,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
            transient_max_attempts: config.transient_max_attempts,
            min_call_interval: Duration::from_millis(config.min_call_interval_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            jitter: config.jitter,
        }
    }
}
