//! Durable per-account sequence counters.
//!
//! Every value handed out is persisted before it is returned, and the
//! per-account lock is held across the whole read-modify-persist. Values
//! for one account are therefore strictly increasing across threads and
//! across restarts.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::AccountKey;
use crate::error::{SequenceError, StoreError};
use crate::port::outbound::clock::Clock;
use crate::port::outbound::store::{load_json, replace_json, StateStore};

/// Store namespace for counter records.
pub const NAMESPACE: &str = "sequence";

/// Persisted counter for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub account: AccountKey,
    pub last: u64,
    /// Set once a legacy single counter has been folded in.
    #[serde(default)]
    pub legacy_migrated: bool,
    pub updated_at: DateTime<Utc>,
}

/// Format of a pre-per-account counter file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyCounter {
    Plain(u64),
    Record {
        #[serde(alias = "nonce", alias = "sequence")]
        last: u64,
    },
}

/// Read a legacy single-counter file.
///
/// # Errors
///
/// Fails on I/O errors other than a missing file, or on unparseable content.
pub fn read_legacy_counter(path: &Path) -> Result<Option<u64>, StoreError> {
    let key = path.display().to_string();
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(StoreError::Io { key, source }),
    };
    let parsed: LegacyCounter =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { key, source })?;
    Ok(Some(match parsed {
        LegacyCounter::Plain(last) | LegacyCounter::Record { last } => last,
    }))
}

#[derive(Debug, Default)]
struct Slot {
    /// `None` until loaded from the store.
    last: Option<u64>,
    legacy_migrated: bool,
}

/// Allocates sequence numbers for any number of accounts.
pub struct SequenceAllocator {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    slots: DashMap<AccountKey, Arc<Mutex<Slot>>>,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            slots: DashMap::new(),
        }
    }

    fn record_key(account: &AccountKey) -> String {
        format!("{NAMESPACE}/{account}")
    }

    fn slot(&self, account: &AccountKey) -> Arc<Mutex<Slot>> {
        Arc::clone(self.slots.entry(account.clone()).or_default().value())
    }

    fn loaded_last(&self, account: &AccountKey, slot: &mut Slot) -> Result<u64, StoreError> {
        if let Some(last) = slot.last {
            return Ok(last);
        }
        let record: Option<SequenceRecord> =
            load_json(self.store.as_ref(), &Self::record_key(account))?;
        let (last, migrated) = record.map_or((0, false), |r| (r.last, r.legacy_migrated));
        slot.last = Some(last);
        slot.legacy_migrated = migrated;
        debug!(account = %account, last, "Loaded sequence counter");
        Ok(last)
    }

    fn persist(
        &self,
        account: &AccountKey,
        slot: &mut Slot,
        value: u64,
        legacy_migrated: bool,
    ) -> Result<(), StoreError> {
        let record = SequenceRecord {
            account: account.clone(),
            last: value,
            legacy_migrated,
            updated_at: Utc::now(),
        };
        replace_json(self.store.as_ref(), &Self::record_key(account), &record)?;
        slot.last = Some(value);
        slot.legacy_migrated = legacy_migrated;
        Ok(())
    }

    /// Next sequence for `account`: `max(now_micros, last + 1)`, persisted
    /// before return.
    ///
    /// # Errors
    ///
    /// Returns a store error if the counter cannot be read or persisted; no
    /// value is emitted in that case.
    pub fn next_sequence(&self, account: &AccountKey) -> Result<u64, SequenceError> {
        let slot = self.slot(account);
        let mut guard = slot.lock();
        let last = self.loaded_last(account, &mut guard)?;
        let candidate = self.clock.now_micros().max(last.saturating_add(1));
        let migrated = guard.legacy_migrated;
        self.persist(account, &mut guard, candidate, migrated)?;
        Ok(candidate)
    }

    /// Move the counter forward by `margin` from `max(last, now)`.
    ///
    /// Returns the new persisted value. The next call to
    /// [`next_sequence`](Self::next_sequence) yields something above it.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn jump(&self, account: &AccountKey, margin: u64) -> Result<u64, SequenceError> {
        let slot = self.slot(account);
        let mut guard = slot.lock();
        let last = self.loaded_last(account, &mut guard)?;
        let jumped = last.max(self.clock.now_micros()).saturating_add(margin);
        let migrated = guard.legacy_migrated;
        self.persist(account, &mut guard, jumped, migrated)?;
        warn!(account = %account, from = last, to = jumped, "Jumped sequence counter forward");
        Ok(jumped)
    }

    /// Last persisted value, if the account has ever allocated one.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn last_persisted(&self, account: &AccountKey) -> Result<Option<u64>, SequenceError> {
        let slot = self.slot(account);
        let mut guard = slot.lock();
        let last = self.loaded_last(account, &mut guard)?;
        Ok((last > 0).then_some(last))
    }

    /// Fold a legacy single counter into the master's record.
    ///
    /// Runs at most once per store: the master record remembers the
    /// migration. The master counter never moves backward. Returns whether
    /// a migration happened.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn migrate_legacy(&self, legacy_last: u64) -> Result<bool, SequenceError> {
        let master = AccountKey::master();
        let slot = self.slot(&master);
        let mut guard = slot.lock();
        let current = self.loaded_last(&master, &mut guard)?;
        if guard.legacy_migrated {
            debug!("Legacy sequence counter already migrated");
            return Ok(false);
        }
        let merged = current.max(legacy_last);
        self.persist(&master, &mut guard, merged, true)?;
        info!(
            legacy = legacy_last,
            previous = current,
            merged,
            "Migrated legacy sequence counter into master"
        );
        Ok(true)
    }
}
