//! Durable record of the devices fixed by the most recent apply run.
//!
//! One line per overridden device, `timestamp|device_name|instance_id`.
//! The file is replaced wholesale by each successful apply batch and deleted
//! after a completed undo; it is the sole source of truth for what this
//! tool changed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::warn;

const FIELD_SEPARATOR: char = '|';

/// History error types.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error accessing history at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One device successfully overridden during an apply batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRecord {
    /// Local time the override was applied
    pub timestamp: String,

    /// Friendly name at apply time (display only; not a stable key)
    pub device_name: String,

    /// Stable instance identifier
    pub instance_id: String,
}

impl OverrideRecord {
    /// Record a device as fixed now.
    pub fn new(device_name: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            device_name: device_name.into(),
            instance_id: instance_id.into(),
        }
    }

    fn to_line(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.timestamp,
            self.device_name,
            self.instance_id,
            sep = FIELD_SEPARATOR
        )
    }

    fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() != 3 {
            return None;
        }
        Some(Self {
            timestamp: fields[0].to_string(),
            device_name: fields[1].to_string(),
            instance_id: fields[2].to_string(),
        })
    }
}

/// File-backed history store.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all records in file order. A missing file reads as empty;
    /// lines with the wrong field count are skipped, not fatal.
    pub fn read(&self) -> Result<Vec<OverrideRecord>, HistoryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match OverrideRecord::parse(line) {
                Some(record) => records.push(record),
                None => warn!(line, "skipping malformed history line"),
            }
        }
        Ok(records)
    }

    /// Replace the store contents with this batch's records.
    pub fn replace(&self, records: &[OverrideRecord]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut file = fs::File::create(&self.path).map_err(|e| self.io_err(e))?;
        for record in records {
            writeln!(file, "{}", record.to_line()).map_err(|e| self.io_err(e))?;
        }
        Ok(())
    }

    /// Delete the store entirely. Clearing an absent store is a no-op.
    pub fn clear(&self) -> Result<(), HistoryError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn io_err(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
