//! Scripted strategy and feed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::{MarketData, OrderSide, Signal};
use crate::error::{BrokerError, Result};
use crate::port::outbound::feed::MarketFeed;
use crate::port::outbound::strategy::Strategy;

/// Returns queued signals per symbol, then a repeating default if set.
#[derive(Default)]
pub struct ScriptedStrategy {
    queued: Mutex<HashMap<String, VecDeque<Signal>>>,
    repeat: Mutex<HashMap<String, Signal>>,
    evaluations: AtomicU64,
}

impl ScriptedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `signal` for `symbol` once.
    pub fn once(self, symbol: &str, signal: Signal) -> Self {
        self.queued
            .lock()
            .entry(symbol.to_string())
            .or_default()
            .push_back(signal);
        self
    }

    /// Emit `signal` for `symbol` on every evaluation after the queue drains.
    pub fn always(self, symbol: &str, signal: Signal) -> Self {
        self.repeat.lock().insert(symbol.to_string(), signal);
        self
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::SeqCst)
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn evaluate(&self, symbol: &str, _market: &MarketData) -> Result<Option<Signal>> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if let Some(signal) = self
            .queued
            .lock()
            .get_mut(symbol)
            .and_then(VecDeque::pop_front)
        {
            return Ok(Some(signal));
        }
        Ok(self.repeat.lock().get(symbol).cloned())
    }
}

/// A signal to buy or sell `notional`.
pub fn signal(side: OrderSide, notional: Decimal) -> Signal {
    Signal {
        side,
        confidence: Decimal::ONE,
        target_notional: notional,
    }
}

/// Feed that quotes a price of one for every symbol and counts reads.
#[derive(Default)]
pub struct CountingFeed {
    reads: AtomicU64,
}

impl CountingFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl MarketFeed for CountingFeed {
    fn latest(&self, symbol: &str) -> std::result::Result<Option<MarketData>, BrokerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Some(MarketData {
            symbol: symbol.to_string(),
            price: Decimal::ONE,
            observed_at: Utc::now(),
        }))
    }
}
