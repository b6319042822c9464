//! Capital safety: limits, the permission table, the durable record, and
//! the state machine that ties them together.

pub mod limits;
pub mod machine;
pub mod permission;
pub mod record;

pub use limits::{EscalationThresholds, SafetyLimits};
pub use machine::{status_from_record, CapitalSafetyStateMachine};
pub use permission::{decide, HALT_REASON};
pub use record::{scope_for, AccountSafety, SafetyRecord, RECORD_KEY, RECORD_VERSION};
