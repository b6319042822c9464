//! Persistence port: an arena-style key/value store.
//!
//! Keys are `namespace/name` with both segments restricted to
//! `[a-z0-9_-]`. Every write replaces the whole record atomically; a
//! reader sees either the old record or the new one, never a mix.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Durable record storage.
pub trait StateStore: Send + Sync {
    /// Raw bytes for `key`, or `None` when absent.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomically replace the record at `key`.
    fn replace(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Remove the record. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

/// Load and deserialize a JSON record.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] when the bytes are not valid JSON for `T`.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.load(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Serialize and atomically replace a JSON record.
///
/// # Errors
///
/// Propagates serialization and store failures.
pub fn replace_json<T: Serialize>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })?;
    store.replace(key, &bytes)
}

/// Validate a `namespace/name` key and split it.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] for anything but two non-empty
/// `[a-z0-9_-]` segments.
pub fn split_key(key: &str) -> Result<(&str, &str), StoreError> {
    let valid = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    };
    match key.split_once('/') {
        Some((ns, name)) if valid(ns) && valid(name) => Ok((ns, name)),
        _ => Err(StoreError::InvalidKey(key.to_string())),
    }
}
