//! Exchange-agnostic domain types.

pub mod account;
pub mod capital;
pub mod failure;
pub mod order;
pub mod replication;
pub mod safety;

pub use account::{Account, AccountKey, AccountRole, CredentialHandle};
pub use capital::{CapitalSnapshot, CapitalThresholds, LevelBand};
pub use failure::{FailureCategory, FailureRecord};
pub use order::{
    FillEvent, MarketData, OrderRequest, OrderResult, OrderSide, OrderStatus, Position, Signal,
    TradeOperation,
};
pub use replication::{
    scale_notional, ReplicationOrder, ReplicationReport, ReplicationResult, ReplicationStatus,
    ReplicationSummary, ScaledSize,
};
pub use safety::{SafetyLevel, SafetyScope, SafetyState, TradeDecision, TransitionRecord};
