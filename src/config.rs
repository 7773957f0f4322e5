//! Persisted settings: reset flag, blacklist, persistence scope.
//!
//! Whole-document JSON, read at the start of every privileged operation and
//! written back after every mutation. Fields absent from an older file are
//! defaulted on load; the schema version is migrated forward explicitly and
//! persisted on the next save. No cross-process locking is provided; the
//! tool is operated by a single user and the scheduled run is the only
//! unattended writer.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::device::{DeviceCategory, PnpDevice};

/// Current schema version. v1 predates the persistence mode field.
pub const CONFIG_VERSION: u32 = 2;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the platform configuration directory")]
    NoConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A device the operator excluded from all apply runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    pub friendly_name: String,
    pub instance_id: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub date_added: String,
}

impl BlacklistEntry {
    /// Build an entry for a present device, stamped now.
    pub fn from_device(device: &PnpDevice) -> Self {
        Self {
            friendly_name: device.friendly_name.clone(),
            instance_id: device.instance_id.clone(),
            class_name: device.class_name.clone(),
            date_added: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(friendly_name: &str, instance_id: &str) -> Self {
        Self {
            friendly_name: friendly_name.to_string(),
            instance_id: instance_id.to_string(),
            class_name: String::new(),
            date_added: String::new(),
        }
    }
}

/// Which category the boot-time reapplication targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    Audio,
    #[default]
    All,
}

impl PersistenceMode {
    pub fn category(self) -> DeviceCategory {
        match self {
            PersistenceMode::Audio => DeviceCategory::Audio,
            PersistenceMode::All => DeviceCategory::All,
        }
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceMode::Audio => write!(f, "audio"),
            PersistenceMode::All => write!(f, "all"),
        }
    }
}

/// Top-level persisted configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Restore default power schemes before each apply batch
    #[serde(default)]
    pub reset_power_options: bool,

    #[serde(default)]
    pub blacklisted_devices: Vec<BlacklistEntry>,

    #[serde(default)]
    pub persistence_mode: PersistenceMode,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            reset_power_options: false,
            blacklisted_devices: Vec::new(),
            persistence_mode: PersistenceMode::All,
        }
    }
}

impl Config {
    /// True if the device matches a blacklist entry by instance id or
    /// friendly name.
    pub fn is_blacklisted(&self, device: &PnpDevice) -> bool {
        self.blacklisted_devices
            .iter()
            .any(|b| b.instance_id == device.instance_id || b.friendly_name == device.friendly_name)
    }

    /// Add a device to the blacklist. False if an entry with the same
    /// instance id already exists.
    pub fn blacklist_add(&mut self, device: &PnpDevice) -> bool {
        if self
            .blacklisted_devices
            .iter()
            .any(|b| b.instance_id == device.instance_id)
        {
            return false;
        }
        self.blacklisted_devices.push(BlacklistEntry::from_device(device));
        true
    }

    /// Remove entries matching the key by instance id or friendly name.
    /// Returns how many entries were removed.
    pub fn blacklist_remove(&mut self, key: &str) -> usize {
        let before = self.blacklisted_devices.len();
        self.blacklisted_devices
            .retain(|b| b.instance_id != key && b.friendly_name != key);
        before - self.blacklisted_devices.len()
    }

    /// Migrate an older schema forward. Fields introduced after the stored
    /// version have already been defaulted by serde; migration records that
    /// the document is now current.
    fn migrate(mut self) -> Self {
        if self.version < CONFIG_VERSION {
            self.version = CONFIG_VERSION;
        }
        self
    }
}

/// File-backed configuration store.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, falling back to defaults when the file is
    /// absent or unreadable. A fallback is logged, never fatal.
    pub fn load(&self) -> Config {
        match self.try_load() {
            Ok(config) => config,
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Config::default()
            }
            Err(e) => {
                warn!(error = %e, "config unreadable, using defaults");
                Config::default()
            }
        }
    }

    fn try_load(&self) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config.migrate())
    }

    /// Serialize and overwrite the whole document.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, json).map_err(|e| self.io_err(e))
    }

    fn io_err(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
