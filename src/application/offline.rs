//! Operator access to the durable safety record while the controller is
//! stopped.
//!
//! Changes are persisted and picked up by the next `warden run`.

use std::sync::Arc;

use crate::application::safety::CapitalSafetyStateMachine;
use crate::domain::{Account, SafetyState};
use crate::error::Result;
use crate::port::inbound::operator::{ControllerStatus, SafetyOperator};

pub struct OfflineController {
    machine: Arc<CapitalSafetyStateMachine>,
    accounts: Vec<Account>,
}

impl OfflineController {
    pub fn new(machine: Arc<CapitalSafetyStateMachine>, accounts: Vec<Account>) -> Self {
        Self { machine, accounts }
    }
}

impl SafetyOperator for OfflineController {
    fn status(&self) -> Result<ControllerStatus> {
        Ok(self.machine.controller_status(&self.accounts))
    }

    fn force_transition(&self, target: SafetyState, reason: &str) -> Result<()> {
        self.machine.force_transition(target, reason)?;
        Ok(())
    }

    fn enable_trading(&self) -> Result<()> {
        Ok(self.machine.enable_trading()?)
    }

    fn disable_trading(&self, reason: &str) -> Result<()> {
        Ok(self.machine.disable_trading(reason)?)
    }
}
