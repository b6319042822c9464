//! Strategy port.
//!
//! Signal generation is external. Any implementation that maps market data
//! to an optional [`Signal`] conforms.

use crate::domain::{MarketData, Signal};
use crate::error::Result;

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Evaluate one symbol. `Ok(None)` means no trade.
    fn evaluate(&self, symbol: &str, market: &MarketData) -> Result<Option<Signal>>;
}
