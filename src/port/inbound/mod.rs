//! Inbound ports (driving side): capabilities exposed to operators.

pub mod operator;
