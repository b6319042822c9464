//! Infrastructure bootstrap helpers for runtime wiring.
//!
//! The composition root: opens the state store, restores the safety
//! machine, migrates a legacy counter, and builds one client and worker per
//! configured account.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::adapter::outbound::paper::{PaperBroker, StaticFeed};
use crate::adapter::outbound::store::FileStore;
use crate::application::offline::OfflineController;
use crate::application::orchestrator::Orchestrator;
use crate::application::replication::{Subscriber, TradeReplicationEngine};
use crate::application::safety::CapitalSafetyStateMachine;
use crate::application::sequence::{
    read_legacy_counter, SequenceAllocator, SequencePolicy, SequencedAccountClient,
};
use crate::application::status::StatusWriter;
use crate::application::worker::{AccountWorker, Replication};
use crate::domain::Account;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::account::AccountConfig;
use crate::infrastructure::config::Config;
use crate::port::outbound::broker::Broker;
use crate::port::outbound::clock::SystemClock;
use crate::port::outbound::feed::MarketFeed;
use crate::port::outbound::store::StateStore;
use crate::port::outbound::strategy::Strategy;

/// Filesystem locations resolved by the caller.
#[derive(Debug, Clone)]
pub struct Locations {
    pub data_dir: PathBuf,
    pub status_file: Option<PathBuf>,
}

/// Store and safety machine shared by every entry point.
pub struct Core {
    pub store: Arc<dyn StateStore>,
    pub machine: Arc<CapitalSafetyStateMachine>,
}

/// Open the store under `data_dir` and restore the safety machine.
///
/// # Errors
///
/// Fails when the persisted safety record exists but cannot be read.
pub fn open_core(config: &Config, data_dir: &Path) -> Result<Core> {
    let store: Arc<dyn StateStore> = Arc::new(FileStore::new(data_dir));
    let machine = Arc::new(CapitalSafetyStateMachine::restore(
        Arc::clone(&store),
        (&config.safety).into(),
    )?);
    Ok(Core { store, machine })
}

/// Every configured account, in configuration order.
///
/// # Errors
///
/// Fails for an unusable account id.
pub fn accounts(config: &Config) -> Result<Vec<Account>> {
    config
        .accounts
        .iter()
        .map(|a| a.to_account().map_err(Into::into))
        .collect()
}

/// Operator handle over the durable record, for use while stopped.
///
/// # Errors
///
/// See [`open_core`] and [`accounts`].
pub fn offline_controller(config: &Config, data_dir: &Path) -> Result<OfflineController> {
    let core = open_core(config, data_dir)?;
    Ok(OfflineController::new(core.machine, accounts(config)?))
}

/// Fold a legacy single-counter file into the master's counter.
fn migrate_legacy_counter(config: &Config, allocator: &SequenceAllocator) -> Result<()> {
    let Some(path) = &config.sequence.legacy_file else {
        return Ok(());
    };
    match read_legacy_counter(path)? {
        Some(last) => {
            if allocator.migrate_legacy(last)? {
                info!(path = %path.display(), last, "Migrated legacy sequence counter");
            }
        }
        None => info!(path = %path.display(), "No legacy sequence counter found"),
    }
    Ok(())
}

fn broker_for(account: &AccountConfig, paper: &Arc<PaperBroker>) -> Result<Arc<dyn Broker>> {
    match account.broker.as_str() {
        "paper" => Ok(Arc::clone(paper) as Arc<dyn Broker>),
        other => Err(ConfigError::InvalidValue {
            field: "accounts.broker",
            reason: format!("unsupported broker '{other}'"),
        }
        .into()),
    }
}

/// Build the orchestrator with every worker wired.
///
/// `strategy` is shared by all workers.
///
/// # Errors
///
/// Fails on store, migration, or account configuration errors.
pub fn build_orchestrator(
    config: &Config,
    locations: &Locations,
    strategy: Arc<dyn Strategy>,
) -> Result<Arc<Orchestrator>> {
    let Core { store, machine } = open_core(config, &locations.data_dir)?;
    let allocator = Arc::new(SequenceAllocator::new(store, Arc::new(SystemClock)));
    migrate_legacy_counter(config, &allocator)?;

    let paper = Arc::new(PaperBroker::new(config.paper.prices.clone()));
    let feed: Arc<dyn MarketFeed> = Arc::new(StaticFeed::new(config.paper.prices.clone()));
    let policy = SequencePolicy::from(&config.sequence);

    let mut entries = Vec::with_capacity(config.accounts.len());
    for account_config in &config.accounts {
        let account = account_config.to_account()?;
        if account_config.broker == "paper" {
            paper.open_account(&account.key, account_config.paper_balance);
        }
        let client = Arc::new(
            SequencedAccountClient::new(
                account.key.clone(),
                broker_for(account_config, &paper)?,
                Arc::clone(&allocator),
                policy.clone(),
            )
            .with_failure_sink(machine.clone()),
        );
        info!(
            account = %account.key,
            role = %account.role,
            broker = %account.broker,
            credential = ?account.credential,
            "Account configured"
        );
        entries.push((account_config, account, client));
    }

    let subscribers: Vec<Subscriber> = entries
        .iter()
        .filter(|(cfg, account, _)| !account.role.is_master() && cfg.copy_master)
        .map(|(cfg, _, client)| {
            let subscriber = Subscriber::new(Arc::clone(client));
            match cfg.risk_ceiling_pct {
                Some(ceiling) => subscriber.with_ceiling(ceiling),
                None => subscriber,
            }
        })
        .collect();
    let engine = Arc::new(TradeReplicationEngine::new(
        machine.clone(),
        (&config.replication).into(),
    ));
    info!(
        subscribers = subscribers.len(),
        enabled = config.replication.enabled,
        "Replication configured"
    );

    let workers = entries
        .into_iter()
        .map(|(cfg, account, client)| {
            let is_master = account.role.is_master();
            let worker = AccountWorker::new(
                account,
                client,
                machine.clone(),
                Arc::clone(&strategy),
                Arc::clone(&feed),
                cfg.symbols.clone(),
            );
            if is_master {
                worker.with_replication(Replication {
                    engine: Arc::clone(&engine),
                    subscribers: subscribers.clone(),
                })
            } else {
                worker
            }
        })
        .collect();

    let mut orchestrator = Orchestrator::new((&config.orchestrator).into(), machine, workers);
    if let Some(path) = &locations.status_file {
        orchestrator = orchestrator.with_status_writer(StatusWriter::new(path.clone()));
    }
    Ok(Arc::new(orchestrator))
}
