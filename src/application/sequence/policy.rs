//! Jump-and-backoff policy for sequenced calls.

use std::time::Duration;

use rand::Rng;

/// 60 seconds of microsecond sequence space.
pub const DEFAULT_JUMP_MARGIN: u64 = 60_000_000;

/// Parameters governing sequence recovery and call pacing.
///
/// The recovery triple is `(jump_margin, base_delay, max_attempts)`: on an
/// invalid-sequence rejection the counter jumps by `jump_margin`, then the
/// retry waits `base_delay * 2^attempt` (capped at `max_delay`, plus up to
/// 20% jitter), for at most `max_attempts` total attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePolicy {
    /// Amount added to the counter after a rejection.
    pub jump_margin: u64,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Attempts per call while the exchange keeps rejecting the sequence.
    pub max_attempts: u32,
    /// Attempts per call for transient network errors and timeouts.
    pub transient_max_attempts: u32,
    /// Minimum spacing between two calls on the same account.
    pub min_call_interval: Duration,
    /// Timeout handed to the adapter for each exchange call.
    pub request_timeout: Duration,
    pub jitter: bool,
}

impl Default for SequencePolicy {
    fn default() -> Self {
        Self {
            jump_margin: DEFAULT_JUMP_MARGIN,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            max_attempts: 5,
            transient_max_attempts: 3,
            min_call_interval: Duration::from_millis(200),
            request_timeout: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl SequencePolicy {
    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        let base = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if !self.jitter {
            return base;
        }
        let jitter_range = u64::try_from(base.as_millis() / 5).unwrap_or(u64::MAX);
        if jitter_range == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_range))
    }
}
