//! Warden - multi-account execution and capital-safety controller.
//!
//! Runs one master trading account and any number of user accounts against
//! a broker. Every request carries a strictly increasing per-account
//! sequence number, every entry passes a capital-aware safety state machine,
//! and master fills are replicated to users scaled by balance and capped by
//! a risk ceiling.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **`domain`** - Accounts, orders, safety states, capital levels
//! - **`port`** - Broker, store, feed, strategy, clock, and operator traits
//! - **`application`** - Sequencing, safety machine, replication, workers
//! - **`adapter`** - CLI, paper broker, file and memory stores
//! - **`infrastructure`** - Configuration and the composition root
//!
//! # Modules
//!
//! - [`application::sequence`] - Per-account sequence allocation and the
//!   resilient broker client
//! - [`application::safety`] - `CapitalSafetyStateMachine` and trade
//!   permission decisions
//! - [`application::replication`] - Copy-trade fan-out to user accounts
//! - [`application::orchestrator`] - Staggered worker start and bounded
//!   shutdown
//! - [`infrastructure::config`] - TOML configuration with validation
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `testkit` - Expose scripted brokers, strategies and clocks for
//!   integration tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use warden::adapter::outbound::strategy::HoldStrategy;
//! use warden::infrastructure::bootstrap::{self, Locations};
//! use warden::infrastructure::config::Config;
//!
//! let config = Config::load("warden.toml")?;
//! let locations = Locations {
//!     data_dir: "state".into(),
//!     status_file: None,
//! };
//! let orchestrator = bootstrap::build_orchestrator(&config, &locations, Arc::new(HoldStrategy))?;
//! orchestrator.start()?;
//! let report = orchestrator.shutdown_default();
//! assert!(report.is_clean());
//! # Ok::<(), warden::error::Error>(())
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
