//! Path utilities for warden.
//!
//! All data lives under `~/.warden/` unless the configuration says otherwise:
//! - `~/.warden/warden.toml` - main configuration
//! - `~/.warden/state/` - durable safety record and sequence counters
//! - `~/.warden/status.json` - status written by a running controller

use std::path::PathBuf;

use crate::infrastructure::bootstrap::Locations;
use crate::infrastructure::config::Config;

/// Returns the warden home directory (`~/.warden/`).
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".warden")
}

/// Returns the default config file path (`~/.warden/warden.toml`).
pub fn default_config() -> PathBuf {
    home_dir().join("warden.toml")
}

/// Returns the default state directory (`~/.warden/state/`).
pub fn default_data_dir() -> PathBuf {
    home_dir().join("state")
}

/// Returns the default status file path (`~/.warden/status.json`).
pub fn default_status_file() -> PathBuf {
    home_dir().join("status.json")
}

/// Resolve the locations a command should use for `config`.
pub fn locations(config: &Config) -> Locations {
    Locations {
        data_dir: config.data_dir.clone().unwrap_or_else(default_data_dir),
        status_file: Some(
            config
                .status_file
                .clone()
                .unwrap_or_else(default_status_file),
        ),
    }
}
