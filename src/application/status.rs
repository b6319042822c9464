//! Status file for external monitoring.
//!
//! A running controller periodically writes its [`ControllerStatus`] as
//! JSON so `warden status` and other tools can poll it without talking to
//! the process.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::port::inbound::operator::ControllerStatus;

/// Current status file format version.
const STATUS_VERSION: &str = "1";

/// Top-level status file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFile {
    /// Schema version for forward compatibility.
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub pid: u32,
    pub controller: ControllerStatus,
    /// When this file was last updated.
    pub updated_at: DateTime<Utc>,
}

impl StatusFile {
    /// Read a status file written by [`StatusWriter`].
    ///
    /// Returns `Ok(None)` when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

/// Writer for the status file.
pub struct StatusWriter {
    path: PathBuf,
    started_at: DateTime<Utc>,
    /// Serializes writers so temp files never collide.
    lock: Mutex<()>,
}

impl StatusWriter {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            started_at: Utc::now(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `controller` to the file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, temp file or rename fails.
    pub fn write(&self, controller: &ControllerStatus) -> Result<()> {
        let now = Utc::now();
        let json = serde_json::to_string_pretty(&StatusFile {
            version: STATUS_VERSION.to_string(),
            started_at: self.started_at,
            pid: std::process::id(),
            controller: controller.clone(),
            updated_at: now,
        })?;

        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;

        let cleanup_and_err = |e| {
            let _ = fs::remove_file(&temp_path);
            e
        };

        file.write_all(json.as_bytes()).map_err(cleanup_and_err)?;
        file.sync_all().map_err(cleanup_and_err)?;
        fs::rename(&temp_path, &self.path).map_err(cleanup_and_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SafetyState;
    use tempfile::TempDir;

    fn controller() -> ControllerStatus {
        ControllerStatus {
            state: SafetyState::Degraded,
            safety_level: None,
            trading_enabled: true,
            disabled_reason: None,
            failure_count: 3,
            accounts: Vec::new(),
            recent_transitions: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("status.json");
        let writer = StatusWriter::new(path.clone());

        writer.write(&controller()).unwrap();

        let file = StatusFile::read(&path).unwrap().unwrap();
        assert_eq!(file.version, "1");
        assert_eq!(file.pid, std::process::id());
        assert_eq!(file.controller.state, SafetyState::Degraded);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        assert!(StatusFile::read(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.json");
        let writer = StatusWriter::new(path.clone());
        writer.write(&controller()).unwrap();

        let mut halted = controller();
        halted.state = SafetyState::EmergencyHalt;
        writer.write(&halted).unwrap();

        let file = StatusFile::read(&path).unwrap().unwrap();
        assert_eq!(file.controller.state, SafetyState::EmergencyHalt);
    }
}
