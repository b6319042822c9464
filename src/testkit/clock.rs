//! Manually driven clock.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::port::outbound::clock::Clock;

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn at(micros: u64) -> Self {
        Self {
            micros: AtomicU64::new(micros),
        }
    }

    pub fn set(&self, micros: u64) {
        self.micros.store(micros, Ordering::SeqCst);
    }

    pub fn advance(&self, micros: u64) {
        self.micros.fetch_add(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.micros.load(Ordering::SeqCst)
    }
}
