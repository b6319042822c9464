//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`broker`] - `ScriptedBroker`, a multi-account [`Broker`](crate::port::outbound::broker::Broker)
//!   with queued failures and a sequence check.
//! - [`strategy`] - `ScriptedStrategy` and `CountingFeed`.
//! - [`clock`] - `ManualClock` for deterministic sequence candidates.
//! - [`config`] - Canonical fast configurations.

pub mod broker;
pub mod clock;
pub mod config;
pub mod strategy;
