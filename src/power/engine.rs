//! Override application engine.
//!
//! Takes the blacklist-filtered candidate set, submits every request
//! variant per device through the power adapter, and replaces the history
//! store with the devices that took at least one override. Per-variant
//! rejections never abort the batch.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::device::PnpDevice;
use crate::history::{HistoryError, HistoryStore, OverrideRecord};

use super::request::apply_variants;
use super::PowerControl;

/// Settling time after a power-scheme reset before overrides are applied.
const SCHEME_RESET_SETTLE: Duration = Duration::from_secs(5);

/// Outcome for one device in a batch.
#[derive(Debug, Clone)]
pub struct DeviceResult {
    pub device: PnpDevice,
    /// How many request variants the interface accepted
    pub succeeded_variants: usize,
    /// How many variants were submitted
    pub attempted_variants: usize,
}

impl DeviceResult {
    /// A device counts as fixed when at least one variant was accepted.
    pub fn is_fixed(&self) -> bool {
        self.succeeded_variants > 0
    }
}

/// Aggregate outcome of an apply batch.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub results: Vec<DeviceResult>,
    /// Whether the power schemes were reset before applying
    pub scheme_reset: bool,
}

/// Batch-level success classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// No candidate devices
    Empty,

    /// Every device took at least one override
    FullyFixed,

    /// Some devices were fixed, some were not
    PartiallyFixed,

    /// No device took any override
    Failed,
}

impl ApplyOutcome {
    pub fn fixed(&self) -> impl Iterator<Item = &DeviceResult> {
        self.results.iter().filter(|r| r.is_fixed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeviceResult> {
        self.results.iter().filter(|r| !r.is_fixed())
    }

    pub fn fixed_count(&self) -> usize {
        self.fixed().count()
    }

    pub fn status(&self) -> BatchStatus {
        let total = self.results.len();
        match self.fixed_count() {
            _ if total == 0 => BatchStatus::Empty,
            0 => BatchStatus::Failed,
            n if n == total => BatchStatus::FullyFixed,
            _ => BatchStatus::PartiallyFixed,
        }
    }
}

/// Drives one apply batch against the power interface.
pub struct ApplyEngine<'a> {
    power: &'a dyn PowerControl,
    settle: Duration,
}

impl<'a> ApplyEngine<'a> {
    pub fn new(power: &'a dyn PowerControl) -> Self {
        Self {
            power,
            settle: SCHEME_RESET_SETTLE,
        }
    }

    #[cfg(test)]
    fn with_settle(power: &'a dyn PowerControl, settle: Duration) -> Self {
        Self { power, settle }
    }

    /// Apply overrides to every candidate device and record the fixed ones.
    ///
    /// When `reset_schemes` is set, the default power schemes are restored
    /// first and the engine waits for the power manager to settle. A reset
    /// failure is logged and does not stop the batch.
    pub fn apply(
        &self,
        devices: &[PnpDevice],
        reset_schemes: bool,
        history: &HistoryStore,
    ) -> Result<ApplyOutcome, HistoryError> {
        if reset_schemes {
            match self.power.reset_schemes() {
                Ok(()) => {
                    info!("power schemes restored to defaults");
                    thread::sleep(self.settle);
                }
                Err(e) => warn!(error = %e, "power scheme reset failed, continuing"),
            }
        }

        let mut results = Vec::with_capacity(devices.len());
        for device in devices {
            let variants = apply_variants(device);
            let attempted = variants.len();
            let mut succeeded = 0usize;
            for request in &variants {
                match self.power.submit(request) {
                    Ok(()) => succeeded += 1,
                    Err(e) => {
                        debug!(identifier = %request.identifier, error = %e, "variant rejected")
                    }
                }
            }
            info!(
                device = %device.display_name(),
                succeeded,
                attempted,
                "override variants submitted"
            );
            results.push(DeviceResult {
                device: device.clone(),
                succeeded_variants: succeeded,
                attempted_variants: attempted,
            });
        }

        let outcome = ApplyOutcome {
            results,
            scheme_reset: reset_schemes,
        };

        // History tracks only the devices fixed by the most recent
        // successful run; a batch with no successes leaves it untouched.
        if outcome.fixed_count() > 0 {
            let records: Vec<OverrideRecord> = outcome
                .fixed()
                .map(|r| {
                    OverrideRecord::new(
                        r.device.friendly_name.clone(),
                        r.device.instance_id.clone(),
                    )
                })
                .collect();
            history.replace(&records)?;
        }

        // Observability only; the listing outcome does not change the batch
        // accounting.
        match self.power.driver_overrides() {
            Ok(entries) => info!(count = entries.len(), "driver overrides now registered"),
            Err(e) => warn!(error = %e, "could not list driver overrides after apply"),
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::testing::FakePower;
    use tempfile::tempdir;

    fn devices() -> Vec<PnpDevice> {
        vec![
            PnpDevice::new(r"USB\VID_1\1", "USB Headset", "MEDIA"),
            PnpDevice::new(r"USB\VID_2\2", "USB Speakers", "AudioEndpoint"),
        ]
    }

    fn history(dir: &tempfile::TempDir) -> HistoryStore {
        HistoryStore::new(dir.path().join("fixed_devices.txt"))
    }

    #[test]
    fn fixed_devices_end_up_in_history() {
        let dir = tempdir().unwrap();
        let store = history(&dir);
        let power = FakePower::new();
        let outcome = ApplyEngine::new(&power).apply(&devices(), false, &store).unwrap();

        assert_eq!(outcome.status(), BatchStatus::FullyFixed);
        let records = store.read().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].instance_id, r"USB\VID_1\1");
        assert_eq!(records[1].instance_id, r"USB\VID_2\2");
    }

    #[test]
    fn history_is_replaced_not_merged() {
        let dir = tempdir().unwrap();
        let store = history(&dir);
        store
            .replace(&[OverrideRecord::new("Stale Device", r"USB\STALE\0")])
            .unwrap();

        let power = FakePower::new();
        ApplyEngine::new(&power).apply(&devices(), false, &store).unwrap();

        let records = store.read().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.instance_id != r"USB\STALE\0"));
    }

    #[test]
    fn apply_twice_yields_identical_history() {
        let dir = tempdir().unwrap();
        let store = history(&dir);
        let power = FakePower::new();
        let engine = ApplyEngine::new(&power);

        engine.apply(&devices(), false, &store).unwrap();
        let first: Vec<String> = store
            .read()
            .unwrap()
            .into_iter()
            .map(|r| r.instance_id)
            .collect();

        engine.apply(&devices(), false, &store).unwrap();
        let second: Vec<String> = store
            .read()
            .unwrap()
            .into_iter()
            .map(|r| r.instance_id)
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn one_failing_device_does_not_abort_the_batch() {
        let dir = tempdir().unwrap();
        let store = history(&dir);
        // Reject every spelling that involves the headset.
        let power = FakePower::rejecting(vec![
            "USB Headset".to_string(),
            r"USB\VID_1\1".to_string(),
        ]);
        let outcome = ApplyEngine::new(&power).apply(&devices(), false, &store).unwrap();

        assert_eq!(outcome.status(), BatchStatus::PartiallyFixed);
        assert_eq!(outcome.fixed_count(), 1);
        // All nine variants were still attempted for both devices.
        assert_eq!(power.submitted.borrow().len(), 18);

        let records = store.read().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance_id, r"USB\VID_2\2");
    }

    #[test]
    fn fully_failed_batch_leaves_history_alone() {
        let dir = tempdir().unwrap();
        let store = history(&dir);
        store
            .replace(&[OverrideRecord::new("Prior Device", r"USB\PRIOR\1")])
            .unwrap();

        let power = FakePower::rejecting_all();
        let outcome = ApplyEngine::new(&power).apply(&devices(), false, &store).unwrap();

        assert_eq!(outcome.status(), BatchStatus::Failed);
        let records = store.read().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance_id, r"USB\PRIOR\1");
    }

    #[test]
    fn scheme_reset_runs_only_when_requested() {
        let dir = tempdir().unwrap();
        let store = history(&dir);
        let power = FakePower::new();
        let engine = ApplyEngine::with_settle(&power, Duration::ZERO);

        engine.apply(&devices(), false, &store).unwrap();
        assert_eq!(*power.reset_calls.borrow(), 0);

        engine.apply(&devices(), true, &store).unwrap();
        assert_eq!(*power.reset_calls.borrow(), 1);
    }

    #[test]
    fn blacklisted_audio_device_never_reaches_history() {
        use crate::config::{BlacklistEntry, Config};
        use crate::device::{classify, filter_blacklisted, DeviceCategory};

        let dir = tempdir().unwrap();
        let store = history(&dir);
        let snapshot = vec![
            PnpDevice::new(r"USB\VID_1\1", "USB Headset", "MEDIA"),
            PnpDevice::new(r"USB\VID_2\2", "USB Speakers", "AudioEndpoint"),
            PnpDevice::new(r"USB\VID_3\3", "Desk Microphone", "MEDIA"),
        ];
        let mut config = Config::default();
        config
            .blacklisted_devices
            .push(BlacklistEntry::for_test("Desk Microphone", r"USB\VID_3\3"));

        let classified = classify(&snapshot, DeviceCategory::Audio);
        let (candidates, excluded) =
            filter_blacklisted(classified, &config.blacklisted_devices);
        assert_eq!(excluded, 1);

        let power = FakePower::new();
        ApplyEngine::new(&power)
            .apply(&candidates, false, &store)
            .unwrap();

        let records = store.read().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.instance_id != r"USB\VID_3\3"));
        // The blacklist itself is untouched by an apply run.
        assert_eq!(config.blacklisted_devices.len(), 1);
    }

    #[test]
    fn empty_candidate_set_is_an_empty_batch() {
        let dir = tempdir().unwrap();
        let store = history(&dir);
        let power = FakePower::new();
        let outcome = ApplyEngine::new(&power).apply(&[], false, &store).unwrap();
        assert_eq!(outcome.status(), BatchStatus::Empty);
        assert!(store.read().unwrap().is_empty());
    }
}
