//! In-memory [`StateStore`] for tests and dry runs.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::port::outbound::store::{split_key, StateStore};

/// Records held in a map. Replacement is atomic under the map lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        split_key(key)?;
        Ok(self.records.lock().get(key).cloned())
    }

    fn replace(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        split_key(key)?;
        self.records.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        split_key(key)?;
        Ok(self.records.lock().remove(key).is_some())
    }
}
