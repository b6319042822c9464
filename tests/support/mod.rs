#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use warden::adapter::outbound::store::MemoryStore;
use warden::application::safety::{CapitalSafetyStateMachine, SafetyLimits};
use warden::application::sequence::{SequenceAllocator, SequencedAccountClient};
use warden::domain::{AccountKey, AccountRole};
use warden::port::outbound::clock::SystemClock;
use warden::port::outbound::store::StateStore;
use warden::testkit::broker::ScriptedBroker;
use warden::testkit::config::fast_policy;

pub fn user(id: &str) -> AccountKey {
    AccountKey::for_role(&AccountRole::User(id.to_string())).unwrap()
}

/// Store, safety machine, allocator and one scripted broker for every account.
pub struct Harness {
    pub store: Arc<dyn StateStore>,
    pub machine: Arc<CapitalSafetyStateMachine>,
    pub allocator: Arc<SequenceAllocator>,
    pub broker: Arc<ScriptedBroker>,
}

impl Harness {
    pub fn new(broker: ScriptedBroker) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), broker)
    }

    pub fn with_store(store: Arc<dyn StateStore>, broker: ScriptedBroker) -> Self {
        let machine = Arc::new(
            CapitalSafetyStateMachine::restore(Arc::clone(&store), SafetyLimits::default())
                .unwrap(),
        );
        let allocator = Arc::new(SequenceAllocator::new(
            Arc::clone(&store),
            Arc::new(SystemClock),
        ));
        Self {
            store,
            machine,
            allocator,
            broker: Arc::new(broker),
        }
    }

    /// Client for `account` that reports failures to the machine.
    pub fn client(&self, account: &AccountKey) -> Arc<SequencedAccountClient> {
        Arc::new(
            SequencedAccountClient::new(
                account.clone(),
                self.broker.clone(),
                Arc::clone(&self.allocator),
                fast_policy(),
            )
            .with_failure_sink(self.machine.clone()),
        )
    }
}

/// Minimal paper configuration rooted at `dir`.
pub fn paper_config(dir: &Path) -> String {
    format!(
        r#"
data_dir = "{data}"
status_file = "{status}"

[logging]
level = "warn"

[orchestrator]
cycle_interval_ms = 20
stagger_ms = 5
shutdown_timeout_ms = 2000
status_interval_ms = 20

[sequence]
min_call_interval_ms = 0
base_delay_ms = 1
max_delay_ms = 4

[paper.prices]
BTC = 50000

[[accounts]]
role = "master"
symbols = ["BTC"]
paper_balance = 10000

[[accounts]]
role = "user"
id = "Alice"
paper_balance = 1000

[[accounts]]
role = "user"
id = "bob"
copy_master = false
"#,
        data = dir.join("state").display(),
        status = dir.join("status.json").display(),
    )
}

/// Write [`paper_config`] to `dir/warden.toml` and return its path.
pub fn write_paper_config(dir: &Path) -> PathBuf {
    let path = dir.join("warden.toml");
    std::fs::write(&path, paper_config(dir)).unwrap();
    path
}
