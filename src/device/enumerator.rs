//! Device snapshot via the system PnP enumeration interface.
//!
//! Shells out to `Get-PnpDevice` and parses its CSV projection. The call is
//! blocking and performed once per operation; a failure here is fatal for
//! the calling operation since nothing can proceed without a device list.

use std::process::Command;

use tracing::{debug, warn};

use super::model::{DeviceError, DeviceStatus, PnpDevice};

const SNAPSHOT_SCRIPT: &str = "Get-PnpDevice | \
     Select-Object InstanceId,FriendlyName,Class,Status,Manufacturer | \
     ConvertTo-Csv -NoTypeInformation";

/// Take a snapshot of every device currently present on the system.
pub fn snapshot() -> Result<Vec<PnpDevice>, DeviceError> {
    let output = Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", SNAPSHOT_SCRIPT])
        .output()
        .map_err(|e| DeviceError::Enumeration(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DeviceError::Enumeration(stderr.trim().to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let devices = parse_snapshot(&stdout)?;
    debug!(count = devices.len(), "device snapshot complete");
    Ok(devices)
}

/// Parse the CSV projection of the device list.
///
/// The first line is the header; each following line carries
/// `InstanceId,FriendlyName,Class,Status,Manufacturer`. Rows that do not
/// parse to five fields are skipped with a warning.
fn parse_snapshot(csv: &str) -> Result<Vec<PnpDevice>, DeviceError> {
    let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
    if lines.next().is_none() {
        return Err(DeviceError::EmptySnapshot);
    }

    let mut devices = Vec::new();
    for line in lines {
        let fields = split_csv_line(line);
        if fields.len() != 5 {
            warn!(line, "skipping unparsable device row");
            continue;
        }
        let mut it = fields.into_iter();
        let instance_id = it.next().unwrap_or_default();
        if instance_id.is_empty() {
            continue;
        }
        let friendly_name = it.next().unwrap_or_default();
        let class_name = it.next().unwrap_or_default();
        let status = DeviceStatus::from_report(&it.next().unwrap_or_default());
        let manufacturer = match it.next().unwrap_or_default() {
            m if m.is_empty() => None,
            m => Some(m),
        };
        devices.push(PnpDevice {
            instance_id,
            friendly_name,
            class_name,
            status,
            manufacturer,
        });
    }
    Ok(devices)
}

/// Split one CSV line into fields, honoring quoted fields with doubled-quote
/// escapes (the dialect `ConvertTo-Csv` emits).
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            c => field.push(c),
        }
    }
    fields.push(field);
    fields
}
