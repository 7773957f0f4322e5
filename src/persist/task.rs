//! Scheduled-task adapter over `schtasks`.
//!
//! Registration goes through a generated task definition XML rather than
//! bare `/Create` switches: the battery and network conditions the boot
//! task needs are only expressible that way.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::config::PersistenceMode;

/// Name of the boot-time reapplication task.
pub const TASK_NAME: &str = "UsbWakeFix";

/// Delay between system startup and the task launch.
const STARTUP_DELAY: &str = "PT4M";

/// Scheduling error types.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to launch schtasks: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("task scheduler rejected the operation: {0}")]
    Rejected(String),

    #[error("could not stage task definition at {path}: {source}")]
    Definition {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Operations the persistence controller needs from the task scheduler.
pub trait TaskScheduler {
    fn is_registered(&self) -> Result<bool, TaskError>;
    fn register(&self, executable: &Path, mode: PersistenceMode) -> Result<(), TaskError>;
    fn unregister(&self) -> Result<(), TaskError>;
}

/// The real scheduler, driven through `schtasks`.
pub struct Schtasks;

impl Schtasks {
    fn run(args: &[&str]) -> Result<std::process::Output, TaskError> {
        debug!(?args, "schtasks");
        Ok(Command::new("schtasks").args(args).output()?)
    }
}

impl TaskScheduler for Schtasks {
    fn is_registered(&self) -> Result<bool, TaskError> {
        // A nonzero exit means the task does not exist; schtasks does not
        // distinguish that from other query failures on its exit code.
        let output = Self::run(&["/Query", "/TN", TASK_NAME])?;
        Ok(output.status.success())
    }

    fn register(&self, executable: &Path, mode: PersistenceMode) -> Result<(), TaskError> {
        let xml = task_definition(executable, mode);
        let staging = std::env::temp_dir().join("usb-wake-fix-task.xml");
        fs::write(&staging, &xml).map_err(|e| TaskError::Definition {
            path: staging.clone(),
            source: e,
        })?;

        let staging_str = staging.to_string_lossy().into_owned();
        let output = Self::run(&["/Create", "/TN", TASK_NAME, "/XML", &staging_str, "/F"])?;
        let _ = fs::remove_file(&staging);

        if output.status.success() {
            Ok(())
        } else {
            Err(TaskError::Rejected(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    fn unregister(&self) -> Result<(), TaskError> {
        let output = Self::run(&["/Delete", "/TN", TASK_NAME, "/F"])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(TaskError::Rejected(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Task Scheduler 1.2 definition: boot trigger with a fixed delay, SYSTEM
/// principal at highest run level, allowed to start on battery with no
/// network requirement.
fn task_definition(executable: &Path, mode: PersistenceMode) -> String {
    let command = xml_escape(&executable.to_string_lossy());
    let arguments = format!("apply --category {mode} --scheduled --yes");
    format!(
        r#"<?xml version="1.0" encoding="UTF-16"?>
<Task version="1.2" xmlns="http://schemas.microsoft.com/windows/2004/02/mit/task">
  <RegistrationInfo>
    <Description>Reapplies USB power request overrides after boot.</Description>
  </RegistrationInfo>
  <Triggers>
    <BootTrigger>
      <Enabled>true</Enabled>
      <Delay>{STARTUP_DELAY}</Delay>
    </BootTrigger>
  </Triggers>
  <Principals>
    <Principal id="Author">
      <UserId>S-1-5-18</UserId>
      <RunLevel>HighestAvailable</RunLevel>
    </Principal>
  </Principals>
  <Settings>
    <DisallowStartIfOnBatteries>false</DisallowStartIfOnBatteries>
    <StopIfGoingOnBatteries>false</StopIfGoingOnBatteries>
    <RunOnlyIfNetworkAvailable>false</RunOnlyIfNetworkAvailable>
    <StartWhenAvailable>true</StartWhenAvailable>
    <AllowHardTerminate>true</AllowHardTerminate>
    <ExecutionTimeLimit>PT1H</ExecutionTimeLimit>
  </Settings>
  <Actions Context="Author">
    <Exec>
      <Command>{command}</Command>
      <Arguments>{arguments}</Arguments>
    </Exec>
  </Actions>
</Task>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_carries_trigger_principal_and_arguments() {
        let xml = task_definition(Path::new(r"C:\Tools\usb-wake-fix.exe"), PersistenceMode::All);
        assert!(xml.contains("<Delay>PT4M</Delay>"));
        assert!(xml.contains("<UserId>S-1-5-18</UserId>"));
        assert!(xml.contains("<RunLevel>HighestAvailable</RunLevel>"));
        assert!(xml.contains("<DisallowStartIfOnBatteries>false</DisallowStartIfOnBatteries>"));
        assert!(xml.contains(r"C:\Tools\usb-wake-fix.exe"));
        assert!(xml.contains("apply --category all --scheduled --yes"));
    }

    #[test]
    fn definition_respects_persistence_mode() {
        let xml = task_definition(Path::new(r"C:\Tools\usb-wake-fix.exe"), PersistenceMode::Audio);
        assert!(xml.contains("apply --category audio --scheduled --yes"));
    }

    #[test]
    fn executable_path_is_escaped() {
        let xml = task_definition(
            Path::new(r"C:\Tools & Utils\usb-wake-fix.exe"),
            PersistenceMode::All,
        );
        assert!(xml.contains(r"C:\Tools &amp; Utils\usb-wake-fix.exe"));
    }
}
