//! Order, position, signal and market data types exchanged with adapters.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of an order or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// What an order does to exposure. Drives the safety check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOperation {
    /// Opens or increases exposure.
    Entry,
    /// Reduces or closes exposure.
    Exit,
    /// Amends an existing order or position.
    Modify,
}

impl fmt::Display for TradeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Exit => write!(f, "exit"),
            Self::Modify => write!(f, "modify"),
        }
    }
}

/// Order submitted to a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Client-side id, unique per submission attempt set.
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    /// Order size in quote currency.
    pub notional: Decimal,
}

/// Exchange-reported order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Filled,
    PartiallyFilled,
    /// Accepted but not yet matched.
    Open,
    Rejected,
}

impl OrderStatus {
    /// Whether any quantity executed.
    #[must_use]
    pub const fn has_fill(self) -> bool {
        matches!(self, Self::Filled | Self::PartiallyFilled)
    }
}

/// Broker response to `place_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub status: OrderStatus,
    pub filled_notional: Decimal,
    pub filled_price: Decimal,
}

/// An open position on one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: OrderSide,
    pub notional: Decimal,
    pub entry_price: Decimal,
}

/// Latest observable state of a symbol, opaque to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Strategy output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub side: OrderSide,
    /// Confidence in `[0, 1]`.
    pub confidence: Decimal,
    pub target_notional: Decimal,
}

impl Signal {
    /// Classify this signal against existing positions on its symbol.
    ///
    /// A signal opposing an open position reduces exposure and is an exit;
    /// anything else is an entry.
    #[must_use]
    pub fn operation_against(&self, symbol: &str, positions: &[Position]) -> TradeOperation {
        let opposes = positions
            .iter()
            .any(|p| p.symbol == symbol && p.side == self.side.opposite());
        if opposes {
            TradeOperation::Exit
        } else {
            TradeOperation::Entry
        }
    }
}

/// A master fill handed to replication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillEvent {
    pub source_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    /// Executed notional on the master account.
    pub notional: Decimal,
    /// Master balance read in the same cycle the order was placed.
    pub master_balance_at_fill: Decimal,
    pub operation: TradeOperation,
    pub filled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(symbol: &str, side: OrderSide) -> Position {
        Position {
            symbol: symbol.into(),
            side,
            notional: dec!(100),
            entry_price: dec!(1),
        }
    }

    fn signal(side: OrderSide) -> Signal {
        Signal {
            side,
            confidence: dec!(0.8),
            target_notional: dec!(50),
        }
    }

    #[test]
    fn test_opposing_signal_is_exit() {
        let positions = vec![position("BTC-USD", OrderSide::Buy)];
        assert_eq!(
            signal(OrderSide::Sell).operation_against("BTC-USD", &positions),
            TradeOperation::Exit
        );
    }

    #[test]
    fn test_same_side_or_other_symbol_is_entry() {
        let positions = vec![position("BTC-USD", OrderSide::Buy)];
        assert_eq!(
            signal(OrderSide::Buy).operation_against("BTC-USD", &positions),
            TradeOperation::Entry
        );
        assert_eq!(
            signal(OrderSide::Sell).operation_against("ETH-USD", &positions),
            TradeOperation::Entry
        );
    }

    #[test]
    fn test_order_status_fill_detection() {
        assert!(OrderStatus::Filled.has_fill());
        assert!(OrderStatus::PartiallyFilled.has_fill());
        assert!(!OrderStatus::Open.has_fill());
        assert!(!OrderStatus::Rejected.has_fill());
    }
}
