//! Worker lifecycle: start, status aggregation, bounded shutdown.
//!
//! One OS thread per account worker. Starts are staggered so the first
//! exchange calls do not all land at once. Shutdown signals every worker
//! and waits up to a deadline; a worker still inside an exchange call past
//! the deadline is logged and left to finish on its own.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::safety::{status_from_record, CapitalSafetyStateMachine};
use super::status::StatusWriter;
use super::worker::{AccountWorker, StopSignal};
use crate::domain::{AccountKey, SafetyScope, SafetyState};
use crate::error::{Error, Result};
use crate::port::inbound::operator::{AccountStatus, ControllerStatus, SafetyOperator};

/// Timings for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Sleep between two cycles of one worker.
    pub cycle_interval: Duration,
    /// Delay between consecutive worker starts.
    pub stagger: Duration,
    pub shutdown_timeout: Duration,
    /// Period of status file writes.
    pub status_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(5),
            stagger: Duration::from_millis(500),
            shutdown_timeout: Duration::from_secs(15),
            status_interval: Duration::from_secs(5),
        }
    }
}

/// Result of [`Orchestrator::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub joined: usize,
    /// Accounts whose worker did not stop before the deadline.
    pub unresponsive: Vec<AccountKey>,
}

impl ShutdownReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unresponsive.is_empty()
    }
}

struct Running {
    account: AccountKey,
    handle: JoinHandle<()>,
}

/// Owns the workers and the shared safety machine.
pub struct Orchestrator {
    settings: OrchestratorSettings,
    machine: Arc<CapitalSafetyStateMachine>,
    workers: Vec<Arc<AccountWorker>>,
    status_writer: Option<Arc<StatusWriter>>,
    stop: Arc<StopSignal>,
    running: Mutex<Vec<Running>>,
    status_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        machine: Arc<CapitalSafetyStateMachine>,
        workers: Vec<AccountWorker>,
    ) -> Self {
        Self {
            settings,
            machine,
            workers: workers.into_iter().map(Arc::new).collect(),
            status_writer: None,
            stop: Arc::new(StopSignal::new()),
            running: Mutex::new(Vec::new()),
            status_thread: Mutex::new(None),
        }
    }

    /// Periodically write status to `writer` while running.
    #[must_use]
    pub fn with_status_writer(mut self, writer: StatusWriter) -> Self {
        self.status_writer = Some(Arc::new(writer));
        self
    }

    #[must_use]
    pub fn machine(&self) -> &Arc<CapitalSafetyStateMachine> {
        &self.machine
    }

    #[must_use]
    pub fn workers(&self) -> &[Arc<AccountWorker>] {
        &self.workers
    }

    /// Spawn one thread per worker, worker `i` after `i * stagger`.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned. Workers already
    /// started keep running until [`shutdown`](Self::shutdown).
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut running = self.running.lock();
        if !running.is_empty() {
            return Ok(());
        }
        info!(
            workers = self.workers.len(),
            stagger_ms = self.settings.stagger.as_millis() as u64,
            state = %self.machine.state(),
            "Starting workers"
        );

        for (index, worker) in self.workers.iter().enumerate() {
            let worker = Arc::clone(worker);
            let stop = Arc::clone(&self.stop);
            let delay = self.settings.stagger.saturating_mul(index as u32);
            let interval = self.settings.cycle_interval;
            let account = worker.account().key.clone();
            let handle = thread::Builder::new()
                .name(format!("worker-{account}"))
                .spawn(move || {
                    if !delay.is_zero() && stop.wait(delay) {
                        return;
                    }
                    worker.run(&stop, interval);
                })
                .map_err(|e| Error::Worker(format!("failed to spawn worker {account}: {e}")))?;
            running.push(Running { account, handle });
        }
        drop(running);

        if let Some(writer) = &self.status_writer {
            let this = Arc::clone(self);
            let writer = Arc::clone(writer);
            let handle = thread::Builder::new()
                .name("status-writer".into())
                .spawn(move || this.write_status_until_stopped(&writer))
                .map_err(|e| Error::Worker(format!("failed to spawn status writer: {e}")))?;
            *self.status_thread.lock() = Some(handle);
        }
        Ok(())
    }

    fn write_status_until_stopped(&self, writer: &StatusWriter) {
        loop {
            if let Err(e) = writer.write(&self.status()) {
                warn!(error = %e, path = %writer.path().display(), "Failed to write status file");
            }
            if self.stop.wait(self.settings.status_interval) {
                break;
            }
        }
    }

    /// Aggregated status of every worker plus the safety record.
    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        let record = self.machine.snapshot();
        let accounts = self
            .workers
            .iter()
            .map(|worker| {
                let account = worker.account();
                let metrics = worker.status();
                AccountStatus {
                    account: account.key.clone(),
                    role: account.role.to_string(),
                    broker: account.broker.clone(),
                    connection: metrics.connection,
                    scoped_state: record.state_of(&SafetyScope::Account(account.key.clone())),
                    effective_state: record.effective_state(&account.key),
                    safety_level: record.account_level(&account.key),
                    balance: metrics.balance,
                    last_cycle_at: metrics.last_cycle_at,
                    cycles: metrics.cycles,
                    orders_submitted: metrics.orders_submitted,
                    consecutive_errors: metrics.consecutive_errors,
                    failure_count: record.failure_count_for(&account.key),
                    last_error: metrics.last_error,
                    last_block_reason: metrics.last_block_reason,
                }
            })
            .collect();
        status_from_record(&record, accounts)
    }

    /// Signal every worker and wait up to `timeout` for them to finish.
    pub fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        info!(timeout_ms = timeout.as_millis() as u64, "Stopping workers");
        self.stop.stop();
        let deadline = Instant::now() + timeout;

        let mut pending = std::mem::take(&mut *self.running.lock());
        let mut report = ShutdownReport::default();
        loop {
            let (finished, unfinished): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|r| r.handle.is_finished());
            for running in finished {
                if running.handle.join().is_err() {
                    error!(account = %running.account, "Worker panicked");
                }
                report.joined += 1;
            }
            pending = unfinished;
            if pending.is_empty() || Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        for running in pending {
            warn!(
                account = %running.account,
                "Worker did not stop before the deadline; leaving it to finish"
            );
            report.unresponsive.push(running.account);
        }

        if let Some(handle) = self.status_thread.lock().take() {
            let _ = handle.join();
        }
        if let Some(writer) = &self.status_writer {
            if let Err(e) = writer.write(&self.status()) {
                warn!(error = %e, "Failed to write final status file");
            }
        }

        info!(
            joined = report.joined,
            unresponsive = report.unresponsive.len(),
            "Shutdown complete"
        );
        report
    }

    /// Shut down with the configured timeout.
    pub fn shutdown_default(&self) -> ShutdownReport {
        self.shutdown(self.settings.shutdown_timeout)
    }
}

impl SafetyOperator for Orchestrator {
    fn status(&self) -> Result<ControllerStatus> {
        Ok(Orchestrator::status(self))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::store::MemoryStore;
    use crate::application::safety::SafetyLimits;
    use crate::application::sequence::{SequenceAllocator, SequencedAccountClient};
    use crate::domain::{Account, AccountRole, CredentialHandle};
    use crate::port::inbound::operator::ConnectionState;
    use crate::port::outbound::clock::SystemClock;
    use crate::testkit::broker::ScriptedBroker;
    use crate::testkit::config::{fast_orchestrator, fast_policy};
    use crate::testkit::strategy::{CountingFeed, ScriptedStrategy};
    use rust_decimal_macros::dec;

    fn orchestrator(ids: &[&str], broker: Arc<ScriptedBroker>) -> Arc<Orchestrator> {
        let store = Arc::new(MemoryStore::new());
        let machine = Arc::new(
            CapitalSafetyStateMachine::restore(store.clone(), SafetyLimits::default()).unwrap(),
        );
        let allocator = Arc::new(SequenceAllocator::new(store, Arc::new(SystemClock)));
        let workers = ids
            .iter()
            .map(|id| {
                let role = if *id == "master" {
                    AccountRole::Master
                } else {
                    AccountRole::User((*id).into())
                };
                let account = Account::new(role, "scripted", CredentialHandle::new("X")).unwrap();
                broker.set_balance(&account.key, dec!(1000));
                let client = Arc::new(
                    SequencedAccountClient::new(
                        account.key.clone(),
                        broker.clone(),
                        allocator.clone(),
                        fast_policy(),
                    )
                    .with_failure_sink(machine.clone()),
                );
                AccountWorker::new(
                    account,
                    client,
                    machine.clone(),
                    Arc::new(ScriptedStrategy::new()),
                    Arc::new(CountingFeed::new()),
                    vec!["ETH-USD".into()],
                )
            })
            .collect();
        Arc::new(Orchestrator::new(fast_orchestrator(), machine, workers))
    }

    fn wait_for(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_status_lists_every_account_before_start() {
        let orch = orchestrator(&["master", "a", "b"], Arc::new(ScriptedBroker::new()));
        let status = orch.status();
        assert_eq!(status.accounts.len(), 3);
        assert!(status
            .accounts
            .iter()
            .all(|a| a.connection == ConnectionState::Pending));
        assert_eq!(status.state, SafetyState::Normal);
    }

    #[test]
    fn test_workers_run_and_stop_cleanly() {
        let orch = orchestrator(&["master", "a"], Arc::new(ScriptedBroker::new()));
        orch.start().unwrap();
        wait_for(|| orch.status().accounts.iter().all(|a| a.cycles >= 2));

        let report = orch.shutdown(Duration::from_secs(2));
        assert!(report.is_clean());
        assert_eq!(report.joined, 2);
        assert!(orch
            .status()
            .accounts
            .iter()
            .all(|a| a.connection == ConnectionState::Stopped));
    }

    #[test]
    fn test_unresponsive_worker_is_reported_not_killed() {
        let broker = Arc::new(ScriptedBroker::new().with_latency(Duration::from_millis(400)));
        let orch = orchestrator(&["slow"], broker);
        orch.start().unwrap();
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        let report = orch.shutdown(Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_millis(350));
        assert_eq!(report.unresponsive.len(), 1);
    }

    #[test]
    fn test_operator_switch_through_trait() {
        let orch = orchestrator(&["master"], Arc::new(ScriptedBroker::new()));
        let operator: &dyn SafetyOperator = &*orch;
        operator.disable_trading("maintenance").unwrap();
        let status = operator.status().unwrap();
        assert!(!status.trading_enabled);
        assert_eq!(status.disabled_reason.as_deref(), Some("maintenance"));
        operator.enable_trading().unwrap();
        assert!(operator.status().unwrap().trading_enabled);
        assert!(operator
            .force_transition(SafetyState::Recovery, "not allowed from normal")
            .is_err());
    }
}
