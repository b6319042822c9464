//! File-backed [`StateStore`].
//!
//! Each key maps to `<root>/<namespace>/<name>.json`. Writes go to a unique
//! temp file in the same directory, are fsynced, then renamed over the
//! target, so a crash leaves either the previous record or the new one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::port::outbound::store::{split_key, StateStore};

/// Store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let (namespace, name) = split_key(key)?;
        Ok(self.root.join(namespace).join(format!("{name}.json")))
    }
}

fn io_err(key: &str) -> impl Fn(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        key: key.to_string(),
        source,
    }
}

impl StateStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(key)(e)),
        }
    }

    fn replace(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err(key))?;
        }

        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let cleanup_and_err = |e| {
            let _ = fs::remove_file(&temp_path);
            io_err(key)(e)
        };

        let mut file = fs::File::create(&temp_path).map_err(io_err(key))?;
        file.write_all(bytes).map_err(cleanup_and_err)?;
        file.sync_all().map_err(cleanup_and_err)?;
        drop(file);

        fs::rename(&temp_path, &path).map_err(cleanup_and_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(key)(e)),
        }
    }
}
