//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!     Operator  ───▶ │      Application        │
//!      (CLI)         │  Domain + Port          │
//!                    └───────────┬─────────────┘
//!          ┌──────────────┬──────┴───────┬──────────────┐
//!          ▼              ▼              ▼              ▼
//!     ┌─────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//!     │ Broker  │   │  Store   │   │   Feed   │   │ Strategy │
//!     └─────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`outbound::broker::Broker`] - order placement, balances, positions
//! - [`outbound::store::StateStore`] - atomically replaced key/value records
//! - [`outbound::feed::MarketFeed`] - opaque market data for strategies
//! - [`outbound::strategy::Strategy`] - signal evaluation
//! - [`outbound::clock::Clock`] - microsecond wall clock for sequence numbers
//! - [`inbound::operator::SafetyOperator`] - status and manual overrides

pub mod inbound;
pub mod outbound;
