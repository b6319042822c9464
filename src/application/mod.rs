//! Application services (use cases).
//!
//! These services coordinate the domain with the outbound ports: the
//! sequenced per-account clients, the safety machine, copy-trade
//! replication, and the worker pool that drives them.

pub mod offline;
pub mod orchestrator;
pub mod replication;
pub mod safety;
pub mod sequence;
pub mod status;
pub mod worker;
