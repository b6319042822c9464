//! The trade permission table.
//!
//! | State | entry | exit | modify |
//! |---|---|---|---|
//! | NORMAL | allowed below DANGER | allowed | allowed |
//! | DEGRADED | allowed at WARNING or safer | allowed | allowed |
//! | RECOVERY | blocked | allowed | restricted |
//! | SAFE_MODE | blocked | allowed | restricted |
//! | EMERGENCY_HALT | blocked | blocked | blocked |
//!
//! A CRITICAL level is treated as EMERGENCY_HALT. The operator switch
//! blocks entries and modifications in every state.

use crate::domain::{SafetyLevel, SafetyState, TradeDecision, TradeOperation};

/// Reason returned for every operation while halted.
pub const HALT_REASON: &str = "EMERGENCY_HALT active";

/// Decide whether `op` may proceed.
///
/// `disabled` carries the operator's reason when trading is switched off.
#[must_use]
pub fn decide(
    state: SafetyState,
    level: Option<SafetyLevel>,
    disabled: Option<&str>,
    op: TradeOperation,
) -> TradeDecision {
    if state == SafetyState::EmergencyHalt || level == Some(SafetyLevel::Critical) {
        return TradeDecision::block(op, HALT_REASON);
    }

    if op != TradeOperation::Exit {
        if let Some(reason) = disabled {
            return TradeDecision::block(op, format!("trading disabled by operator: {reason}"));
        }
    }

    match op {
        TradeOperation::Exit => TradeDecision::allow(op, format!("exits allowed in {state}")),
        TradeOperation::Entry => match state {
            SafetyState::Recovery | SafetyState::SafeMode => {
                TradeDecision::block(op, format!("entries blocked in {state}"))
            }
            _ if level >= Some(SafetyLevel::Danger) => TradeDecision::block(
                op,
                "entries blocked at safety level DANGER".to_string(),
            ),
            _ => TradeDecision::allow(
                op,
                format!(
                    "entry allowed in {state} at level {}",
                    level.unwrap_or_default()
                ),
            ),
        },
        TradeOperation::Modify => match state {
            SafetyState::Recovery | SafetyState::SafeMode => TradeDecision::restrict(
                op,
                format!("only risk-reducing modifications allowed in {state}"),
            ),
            _ => TradeDecision::allow(op, format!("modifications allowed in {state}")),
        },
    }
}
