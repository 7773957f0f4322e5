//! Override removal engine.
//!
//! Safe mode undoes exactly what history records; nuclear mode sweeps every
//! present USB device regardless of history, which is the only way to clear
//! overrides left behind for removed or renamed devices. Both modes clear
//! history when done, even after per-record failures: the tool deliberately
//! forgets what it cannot reliably map back.

use tracing::{debug, info};

use crate::device::PnpDevice;
use crate::history::{HistoryError, HistoryStore};

use super::request::removal_variants;
use super::PowerControl;

/// Aggregate outcome of an undo run.
#[derive(Debug, Clone)]
pub struct RemovalOutcome {
    /// How many entries removal was attempted for
    pub attempted: usize,

    /// Entries where at least one clearing variant succeeded
    pub removed: usize,

    /// Display names of entries where every variant failed
    pub failed: Vec<String>,
}

impl RemovalOutcome {
    pub fn all_removed(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives one undo run against the power interface.
pub struct RemovalEngine<'a> {
    power: &'a dyn PowerControl,
}

impl<'a> RemovalEngine<'a> {
    pub fn new(power: &'a dyn PowerControl) -> Self {
        Self { power }
    }

    /// Undo the overrides history records, then clear history.
    ///
    /// Removal is unconditional for every record; stale records for devices
    /// no longer present are attempted like any other. History is cleared
    /// even when some removals failed.
    pub fn undo_safe(&self, history: &HistoryStore) -> Result<RemovalOutcome, HistoryError> {
        let records = history.read()?;
        let mut outcome = RemovalOutcome {
            attempted: records.len(),
            removed: 0,
            failed: Vec::new(),
        };

        for record in &records {
            if self.clear_entry(&record.device_name, &record.instance_id) {
                outcome.removed += 1;
            } else {
                outcome.failed.push(record.device_name.clone());
            }
        }

        history.clear()?;
        info!(
            attempted = outcome.attempted,
            removed = outcome.removed,
            "safe removal complete, history cleared"
        );
        Ok(outcome)
    }

    /// Attempt removal on every present USB device, ignoring history.
    ///
    /// Also clears overrides this tool never applied, including entries the
    /// operator registered manually. History is cleared afterward as well.
    pub fn undo_nuclear(
        &self,
        devices: &[PnpDevice],
        history: &HistoryStore,
    ) -> Result<RemovalOutcome, HistoryError> {
        let mut outcome = RemovalOutcome {
            attempted: devices.len(),
            removed: 0,
            failed: Vec::new(),
        };

        for device in devices {
            if self.clear_entry(&device.friendly_name, &device.instance_id) {
                outcome.removed += 1;
            } else {
                outcome.failed.push(device.display_name().to_string());
            }
        }

        history.clear()?;
        info!(
            attempted = outcome.attempted,
            removed = outcome.removed,
            "nuclear removal complete, history cleared"
        );
        Ok(outcome)
    }

    /// Submit every clearing variant for one entry. True if any succeeded.
    fn clear_entry(&self, device_name: &str, instance_id: &str) -> bool {
        let mut any = false;
        for request in removal_variants(device_name, instance_id) {
            match self.power.submit(&request) {
                Ok(()) => any = true,
                Err(e) => debug!(identifier = %request.identifier, error = %e, "variant rejected"),
            }
        }
        any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::OverrideRecord;
    use crate::power::testing::FakePower;
    use tempfile::tempdir;

    fn seeded_history(dir: &tempfile::TempDir) -> HistoryStore {
        let store = HistoryStore::new(dir.path().join("fixed_devices.txt"));
        store
            .replace(&[
                OverrideRecord::new("USB Headset", r"USB\VID_1\1"),
                OverrideRecord::new("USB Speakers", r"USB\VID_2\2"),
            ])
            .unwrap();
        store
    }

    #[test]
    fn safe_undo_clears_history_on_success() {
        let dir = tempdir().unwrap();
        let store = seeded_history(&dir);
        let power = FakePower::new();

        let outcome = RemovalEngine::new(&power).undo_safe(&store).unwrap();
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.removed, 2);
        assert!(outcome.all_removed());
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn safe_undo_clears_history_despite_failures() {
        let dir = tempdir().unwrap();
        let store = seeded_history(&dir);
        let power = FakePower::rejecting_all();

        let outcome = RemovalEngine::new(&power).undo_safe(&store).unwrap();
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.failed, vec!["USB Headset", "USB Speakers"]);
        // The tool forgets what it cannot map back.
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn stale_records_are_attempted_independently() {
        let dir = tempdir().unwrap();
        let store = seeded_history(&dir);
        // Only the headset's spellings are rejected.
        let power = FakePower::rejecting(vec![
            "USB Headset".to_string(),
            r"USB\VID_1\1".to_string(),
        ]);

        let outcome = RemovalEngine::new(&power).undo_safe(&store).unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.failed, vec!["USB Headset"]);
        // Four clearing variants were submitted per record.
        assert_eq!(power.submitted.borrow().len(), 8);
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn empty_history_is_a_clean_no_op() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("fixed_devices.txt"));
        let power = FakePower::new();

        let outcome = RemovalEngine::new(&power).undo_safe(&store).unwrap();
        assert_eq!(outcome.attempted, 0);
        assert!(power.submitted.borrow().is_empty());
    }

    #[test]
    fn nuclear_sweeps_devices_and_clears_history() {
        let dir = tempdir().unwrap();
        let store = seeded_history(&dir);
        let power = FakePower::new();
        let devices = vec![
            PnpDevice::new(r"USB\VID_9\9", "Unrelated USB Mouse", "Mouse"),
            PnpDevice::new(r"USB\VID_1\1", "USB Headset", "MEDIA"),
        ];

        let outcome = RemovalEngine::new(&power)
            .undo_nuclear(&devices, &store)
            .unwrap();
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.removed, 2);
        // The sweep includes devices history never knew about.
        assert!(power.submissions_for("Unrelated USB Mouse") > 0);
        assert!(store.read().unwrap().is_empty());
    }
}
