//! Outbound adapters (driven side).

pub mod paper;
pub mod store;
pub mod strategy;
