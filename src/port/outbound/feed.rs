//! Market data port.

use crate::domain::MarketData;
use crate::error::BrokerError;

/// Latest market data per symbol. Blocking.
pub trait MarketFeed: Send + Sync {
    /// `Ok(None)` when the symbol has no data yet.
    fn latest(&self, symbol: &str) -> Result<Option<MarketData>, BrokerError>;
}
