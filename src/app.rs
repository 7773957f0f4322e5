//! Session state and the operations behind every command.
//!
//! A `Session` loads the persisted configuration once and carries it through
//! one invocation; the CLI and the interactive menu both dispatch into the
//! operations here. Overrides and scheduling require an elevated process,
//! checked at the start of each operation that touches them.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tracing::info;

use crate::config::{BlacklistEntry, Config, ConfigError, ConfigStore, PersistenceMode};
use crate::device::{self, DeviceCategory, PnpDevice};
use crate::history::{HistoryStore, OverrideRecord};
use crate::persist::{DisableOutcome, EnableOutcome, PersistenceController, Schtasks};
use crate::platform;
use crate::power::{
    ApplyEngine, ApplyOutcome, Powercfg, PowerControl, RemovalEngine, RemovalOutcome,
};

/// Additional in-process wait before a scheduled run touches any device,
/// on top of the task trigger delay. Device drivers can still be
/// initializing when the scheduler fires.
const SCHEDULED_STARTUP_WAIT: Duration = Duration::from_secs(30);

const APP_DIR: &str = "UsbWakeFix";

/// Operation-level error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("this operation requires administrator privileges; restart from an elevated prompt")]
    NotElevated,

    #[error("no present device matches '{0}'")]
    DeviceNotMatched(String),

    #[error("'{0}' is already blacklisted")]
    AlreadyBlacklisted(String),

    #[error("unknown configuration field '{0}' (expected resetPowerOptions or persistenceMode)")]
    UnknownField(String),

    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: String, value: String },
}

/// Locations of the persisted resources.
pub struct Paths {
    pub config: PathBuf,
    pub history: PathBuf,
    pub run_log: PathBuf,
}

impl Paths {
    /// Resolve under the per-user configuration directory, creating it on
    /// first use.
    pub fn resolve() -> Result<Self, ConfigError> {
        let base = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(APP_DIR);
        std::fs::create_dir_all(&base).map_err(|e| ConfigError::Io {
            path: base.clone(),
            source: e,
        })?;
        Ok(Self {
            config: base.join("config.json"),
            history: base.join("fixed_devices.txt"),
            run_log: base.join("last_run.log"),
        })
    }
}

/// The candidate set an apply run would touch, shown to the operator before
/// anything is submitted.
pub struct ApplyPlan {
    pub category: DeviceCategory,
    pub devices: Vec<PnpDevice>,
    pub excluded: usize,
}

/// Everything `status` reports.
pub struct StatusReport {
    pub blockers: Vec<String>,
    pub history: Vec<OverrideRecord>,
    pub persistence_enabled: bool,
    pub reset_power_options: bool,
    pub persistence_mode: PersistenceMode,
    pub blacklist_len: usize,
}

/// One invocation's state: resolved paths plus the loaded configuration.
pub struct Session {
    pub paths: Paths,
    pub config: Config,
    store: ConfigStore,
}

impl Session {
    pub fn open() -> Result<Self> {
        let paths = Paths::resolve()?;
        let store = ConfigStore::new(&paths.config);
        let config = store.load();
        Ok(Self {
            paths,
            config,
            store,
        })
    }

    pub fn history(&self) -> HistoryStore {
        HistoryStore::new(&self.paths.history)
    }

    /// Persist the in-memory configuration. A save failure is surfaced but
    /// the in-memory state stands.
    pub fn save_config(&self) -> Result<()> {
        self.store.save(&self.config)?;
        Ok(())
    }

    fn require_elevation(&self) -> Result<()> {
        if platform::is_elevated() {
            Ok(())
        } else {
            Err(AppError::NotElevated.into())
        }
    }

    // ------------------------------------------------------------------
    // Apply
    // ------------------------------------------------------------------

    /// Classify and blacklist-filter the devices an apply run would touch.
    pub fn plan_apply(&self, category: DeviceCategory) -> Result<ApplyPlan> {
        self.require_elevation()?;
        let snapshot = device::snapshot()?;
        let classified = device::classify(&snapshot, category);
        let (devices, excluded) =
            device::filter_blacklisted(classified, &self.config.blacklisted_devices);
        Ok(ApplyPlan {
            category,
            devices,
            excluded,
        })
    }

    /// Run the override batch for a prepared plan.
    pub fn run_apply(&self, plan: &ApplyPlan) -> Result<ApplyOutcome> {
        self.require_elevation()?;
        let power = Powercfg;
        let history = self.history();
        let outcome = ApplyEngine::new(&power).apply(
            &plan.devices,
            self.config.reset_power_options,
            &history,
        )?;
        Ok(outcome)
    }

    /// The unattended entry point the boot task invokes.
    ///
    /// Waits a fixed interval for device drivers to finish initializing,
    /// then applies to the category the task was registered with, without
    /// prompting.
    pub fn run_scheduled_apply(&self, category: DeviceCategory) -> Result<ApplyOutcome> {
        info!(
            wait_secs = SCHEDULED_STARTUP_WAIT.as_secs(),
            "scheduled run, waiting for device initialization"
        );
        thread::sleep(SCHEDULED_STARTUP_WAIT);
        let plan = self.plan_apply(category)?;
        info!(
            candidates = plan.devices.len(),
            excluded = plan.excluded,
            "scheduled apply starting"
        );
        self.run_apply(&plan)
    }

    // ------------------------------------------------------------------
    // Status / listing
    // ------------------------------------------------------------------

    pub fn status(&self) -> Result<StatusReport> {
        self.require_elevation()?;
        let power = Powercfg;
        let blockers = power.driver_blockers()?;
        let history = self.history().read()?;
        let persistence_enabled = self.persistence().is_enabled()?;
        Ok(StatusReport {
            blockers,
            history,
            persistence_enabled,
            reset_power_options: self.config.reset_power_options,
            persistence_mode: self.config.persistence_mode,
            blacklist_len: self.config.blacklisted_devices.len(),
        })
    }

    pub fn list_overrides(&self) -> Result<Vec<String>> {
        let power = Powercfg;
        Ok(power.driver_overrides()?)
    }

    // ------------------------------------------------------------------
    // Undo
    // ------------------------------------------------------------------

    /// Undo overrides. Safe mode follows history; nuclear mode sweeps every
    /// present USB device.
    pub fn undo(&self, nuclear: bool) -> Result<RemovalOutcome> {
        self.require_elevation()?;
        let power = Powercfg;
        let engine = RemovalEngine::new(&power);
        let history = self.history();
        let outcome = if nuclear {
            let snapshot = device::snapshot()?;
            let devices = device::classify(&snapshot, DeviceCategory::All);
            engine.undo_nuclear(&devices, &history)?
        } else {
            engine.undo_safe(&history)?
        };
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn persistence(&self) -> PersistenceController<'static> {
        static SCHEDULER: Schtasks = Schtasks;
        let executable = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("usb-wake-fix"));
        PersistenceController::new(&SCHEDULER, executable)
    }

    pub fn persistence_enable(&self) -> Result<EnableOutcome> {
        self.require_elevation()?;
        Ok(self.persistence().enable(self.config.persistence_mode)?)
    }

    pub fn persistence_disable(&self) -> Result<DisableOutcome> {
        self.require_elevation()?;
        Ok(self.persistence().disable()?)
    }

    pub fn persistence_status(&self) -> Result<bool> {
        self.require_elevation()?;
        Ok(self.persistence().is_enabled()?)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn config_get(&self, field: &str) -> Result<String> {
        match field {
            "resetPowerOptions" => Ok(self.config.reset_power_options.to_string()),
            "persistenceMode" => Ok(self.config.persistence_mode.to_string()),
            "version" => Ok(self.config.version.to_string()),
            other => Err(AppError::UnknownField(other.to_string()).into()),
        }
    }

    pub fn config_set(&mut self, field: &str, value: &str) -> Result<()> {
        match field {
            "resetPowerOptions" => {
                self.config.reset_power_options =
                    value.parse().map_err(|_| AppError::InvalidValue {
                        field: field.to_string(),
                        value: value.to_string(),
                    })?;
            }
            "persistenceMode" => {
                self.config.persistence_mode = match value.to_ascii_lowercase().as_str() {
                    "audio" => PersistenceMode::Audio,
                    "all" => PersistenceMode::All,
                    _ => {
                        return Err(AppError::InvalidValue {
                            field: field.to_string(),
                            value: value.to_string(),
                        }
                        .into())
                    }
                };
            }
            other => return Err(AppError::UnknownField(other.to_string()).into()),
        }
        self.save_config()
    }

    /// Blacklist a present device by exact instance id or friendly name.
    pub fn blacklist_add(&mut self, key: &str) -> Result<BlacklistEntry> {
        let snapshot = device::snapshot()?;
        let device = snapshot
            .iter()
            .find(|d| d.instance_id == key || d.friendly_name == key)
            .ok_or_else(|| AppError::DeviceNotMatched(key.to_string()))?
            .clone();
        self.blacklist_add_device(&device)
    }

    /// Blacklist an already-resolved device (used by the menu's picker).
    pub fn blacklist_add_device(&mut self, device: &PnpDevice) -> Result<BlacklistEntry> {
        if !self.config.blacklist_add(device) {
            return Err(AppError::AlreadyBlacklisted(device.display_name().to_string()).into());
        }
        self.save_config()?;
        let entry = self
            .config
            .blacklisted_devices
            .last()
            .cloned()
            .unwrap_or_else(|| BlacklistEntry::from_device(device));
        Ok(entry)
    }

    /// Remove blacklist entries matching the key. True if anything matched.
    pub fn blacklist_remove(&mut self, key: &str) -> Result<bool> {
        let removed = self.config.blacklist_remove(key);
        if removed > 0 {
            self.save_config()?;
        }
        Ok(removed > 0)
    }
}
