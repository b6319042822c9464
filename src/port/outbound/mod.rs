//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe infrastructure dependencies such as brokers,
//! storage, market data, strategies, and time.

pub mod broker;
pub mod clock;
pub mod feed;
pub mod store;
pub mod strategy;
