//! Built-in strategies.

use crate::domain::{MarketData, Signal};
use crate::error::Result;
use crate::port::outbound::strategy::Strategy;

/// Never signals. Keeps the loop, capital assessment and status running
/// without trading.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldStrategy;

impl Strategy for HoldStrategy {
    fn name(&self) -> &str {
        "hold"
    }

    fn evaluate(&self, _symbol: &str, _market: &MarketData) -> Result<Option<Signal>> {
        Ok(None)
    }
}
