//! USB Wake Fix - Library
//!
//! A Windows command-line utility that stops USB peripherals from keeping
//! the machine awake.
//!
//! ## Features
//!
//! - Classify present USB devices into audio / all-supported categories
//! - Register power request overrides per device, trying every identifier
//!   and flag spelling the power manager might match
//! - Remember what was changed in a durable history file and undo it
//! - Optional nuclear undo across every present USB device
//! - Boot-time scheduled task that reapplies the fix unattended
//! - Per-device blacklist and persisted JSON configuration

pub mod app;
pub mod config;
pub mod device;
pub mod history;
pub mod logging;
pub mod persist;
pub mod platform;
pub mod power;
pub mod ui;

pub use app::{AppError, ApplyPlan, Paths, Session, StatusReport};
pub use config::{BlacklistEntry, Config, ConfigStore, PersistenceMode};
pub use device::{DeviceCategory, DeviceError, PnpDevice};
pub use history::{HistoryStore, OverrideRecord};
pub use power::{ApplyOutcome, BatchStatus, OverrideFlag, OverrideRequest, RemovalOutcome};
