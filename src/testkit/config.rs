//! Canonical test configurations.
//!
//! Single source of truth for policy and limit structs used across tests.

use std::time::Duration;

use crate::application::orchestrator::OrchestratorSettings;
use crate::application::sequence::SequencePolicy;

/// Sequence policy with no pacing and millisecond backoff.
pub fn fast_policy() -> SequencePolicy {
    SequencePolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        min_call_interval: Duration::ZERO,
        request_timeout: Duration::from_secs(1),
        jitter: false,
        ..SequencePolicy::default()
    }
}

/// Orchestrator timings suited to tests that run a few cycles.
pub fn fast_orchestrator() -> OrchestratorSettings {
    OrchestratorSettings {
        cycle_interval: Duration::from_millis(20),
        stagger: Duration::from_millis(10),
        shutdown_timeout: Duration::from_secs(2),
        status_interval: Duration::from_millis(20),
    }
}
