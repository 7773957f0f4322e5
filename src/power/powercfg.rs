//! The single adapter over the `powercfg` command.
//!
//! Every override registration, listing, blocker query, and scheme reset
//! goes through here. Callers hand over structured [`OverrideRequest`]
//! values; no command string is assembled anywhere else.

use std::process::Command;

use thiserror::Error;
use tracing::debug;

use super::request::OverrideRequest;
use super::PowerControl;

/// Caller category used for driver-originated power requests.
const CALLER_TYPE: &str = "DRIVER";

/// Power adapter error types.
#[derive(Debug, Error)]
pub enum PowerError {
    #[error("failed to launch powercfg: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("powercfg rejected the request: {0}")]
    Rejected(String),
}

/// The real power-management interface.
pub struct Powercfg;

impl Powercfg {
    fn run(args: &[&str]) -> Result<String, PowerError> {
        debug!(?args, "powercfg");
        let output = Command::new("powercfg").args(args).output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if message.is_empty() {
                message = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            Err(PowerError::Rejected(message))
        }
    }
}

impl PowerControl for Powercfg {
    fn submit(&self, request: &OverrideRequest) -> Result<(), PowerError> {
        let mut args = vec!["/requestsoverride", CALLER_TYPE, request.identifier.as_str()];
        args.extend(request.flags.iter().map(|f| f.token()));
        Self::run(&args).map(|_| ())
    }

    fn reset_schemes(&self) -> Result<(), PowerError> {
        Self::run(&["-restoredefaultschemes"]).map(|_| ())
    }

    fn driver_overrides(&self) -> Result<Vec<String>, PowerError> {
        let output = Self::run(&["/requestsoverride"])?;
        Ok(parse_driver_overrides(&output))
    }

    fn driver_blockers(&self) -> Result<Vec<String>, PowerError> {
        let output = Self::run(&["/requests"])?;
        Ok(parse_driver_blockers(&output))
    }
}

/// Extract the entries under the `[DRIVER]` heading of the override listing.
///
/// The listing groups overrides by caller type:
///
/// ```text
/// [DRIVER]
/// USB Audio Device DISPLAY SYSTEM AWAYMODE
///
/// [PROCESS]
/// ...
/// ```
fn parse_driver_overrides(output: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut in_driver_section = false;
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            in_driver_section = trimmed.eq_ignore_ascii_case("[DRIVER]");
            continue;
        }
        if in_driver_section && !trimmed.is_empty() {
            entries.push(trimmed.to_string());
        }
    }
    entries
}

/// Extract driver-tagged entries under the `SYSTEM:` category of the active
/// request listing.
///
/// ```text
/// SYSTEM:
/// [DRIVER] USB Audio Device (USB\VID_046D&PID_0A8F\12345)
/// An audio stream is currently in use.
///
/// DISPLAY:
/// None.
/// ```
fn parse_driver_blockers(output: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut in_system_section = false;
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.ends_with(':') && !trimmed.starts_with('[') {
            in_system_section = trimmed.eq_ignore_ascii_case("SYSTEM:");
            continue;
        }
        if in_system_section && trimmed.starts_with("[DRIVER]") {
            entries.push(trimmed.to_string());
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_listing_keeps_only_driver_section() {
        let output = "\
[DRIVER]
USB Audio Device DISPLAY SYSTEM AWAYMODE
USB Headset SYSTEM

[PROCESS]
C:\\apps\\player.exe DISPLAY

[SERVICE]
";
        let entries = parse_driver_overrides(output);
        assert_eq!(
            entries,
            vec!["USB Audio Device DISPLAY SYSTEM AWAYMODE", "USB Headset SYSTEM"]
        );
    }

    #[test]
    fn override_listing_may_be_empty() {
        assert!(parse_driver_overrides("[DRIVER]\n\n[PROCESS]\n").is_empty());
        assert!(parse_driver_overrides("").is_empty());
    }

    #[test]
    fn blocker_listing_keeps_driver_entries_under_system() {
        let output = "\
DISPLAY:
None.

SYSTEM:
[DRIVER] USB Audio Device (USB\\VID_046D&PID_0A8F\\12345)
An audio stream is currently in use.
[PROCESS] \\Device\\HarddiskVolume3\\player.exe

AWAYMODE:
[DRIVER] Something Else
";
        let entries = parse_driver_blockers(output);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("USB Audio Device"));
    }

    #[test]
    fn blocker_listing_with_no_system_drivers() {
        let output = "SYSTEM:\nNone.\n\nDISPLAY:\nNone.\n";
        assert!(parse_driver_blockers(output).is_empty());
    }
}
