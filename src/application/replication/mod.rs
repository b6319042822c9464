//! Copy-trade replication.

pub mod engine;

pub use engine::{ReplicationSettings, Subscriber, TradeReplicationEngine};
