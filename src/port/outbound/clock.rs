//! Wall-clock port used for sequence candidates.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of microseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> u64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}
