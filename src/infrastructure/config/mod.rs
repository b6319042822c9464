//! Infrastructure configuration modules.

pub mod account;
pub mod logging;
pub mod orchestrator;
pub mod replication;
pub mod safety;
pub mod sequence;
pub mod settings;

pub use settings::Config;
