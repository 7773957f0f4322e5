//! Plug-and-Play device data models.
//!
//! Defines the core data structures for representing present PnP devices,
//! their status, and the category filter applied before overrides.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A device present on the system at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PnpDevice {
    /// Stable per-instance identifier (e.g. `USB\VID_046D&PID_0A8F\...`)
    pub instance_id: String,

    /// Human-readable device label. Not guaranteed unique and may change
    /// across driver reinstalls.
    pub friendly_name: String,

    /// Setup class name reported by the system (e.g. `AudioEndpoint`, `MEDIA`,
    /// `HIDClass`, `Mouse`, `Keyboard`)
    pub class_name: String,

    /// Reported device status
    pub status: DeviceStatus,

    /// Driver provider, for display only
    pub manufacturer: Option<String>,
}

impl PnpDevice {
    /// Create a device with OK status and no manufacturer.
    pub fn new(
        instance_id: impl Into<String>,
        friendly_name: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            friendly_name: friendly_name.into(),
            class_name: class_name.into(),
            status: DeviceStatus::Ok,
            manufacturer: None,
        }
    }

    /// True if the instance path identifies a USB-attached device.
    pub fn is_usb(&self) -> bool {
        let upper = self.instance_id.to_ascii_uppercase();
        upper.starts_with("USB")
    }

    /// True if the device reported a healthy status.
    pub fn is_ok(&self) -> bool {
        self.status == DeviceStatus::Ok
    }

    /// Display label, falling back to the instance id for nameless devices.
    pub fn display_name(&self) -> &str {
        if self.friendly_name.is_empty() {
            &self.instance_id
        } else {
            &self.friendly_name
        }
    }
}

/// Device status as reported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Device is started and working
    Ok,

    /// Device reported a problem code
    Problem,

    /// Status could not be determined
    Unknown,
}

impl DeviceStatus {
    /// Map the status string reported by the enumeration interface.
    pub fn from_report(s: &str) -> Self {
        match s.trim() {
            s if s.eq_ignore_ascii_case("OK") => DeviceStatus::Ok,
            "" => DeviceStatus::Unknown,
            s if s.eq_ignore_ascii_case("Unknown") => DeviceStatus::Unknown,
            _ => DeviceStatus::Problem,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Ok => write!(f, "OK"),
            DeviceStatus::Problem => write!(f, "Problem"),
            DeviceStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Which devices an apply run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCategory {
    /// Audio endpoints only
    Audio,

    /// Audio endpoints plus HID input devices
    All,
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCategory::Audio => write!(f, "audio"),
            DeviceCategory::All => write!(f, "all"),
        }
    }
}

impl FromStr for DeviceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(DeviceCategory::Audio),
            "all" => Ok(DeviceCategory::All),
            other => Err(format!("unknown category '{other}' (expected 'audio' or 'all')")),
        }
    }
}

/// Device layer error types.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to enumerate devices: {0}")]
    Enumeration(String),

    #[error("device enumeration produced no parsable output")]
    EmptySnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_prefix_is_case_insensitive() {
        let dev = PnpDevice::new(r"usb\VID_1234&PID_5678\001", "Thing", "MEDIA");
        assert!(dev.is_usb());
        let hid = PnpDevice::new(r"HID\VID_1234&PID_5678\002", "Thing", "HIDClass");
        assert!(!hid.is_usb());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(DeviceStatus::from_report("OK"), DeviceStatus::Ok);
        assert_eq!(DeviceStatus::from_report("ok"), DeviceStatus::Ok);
        assert_eq!(DeviceStatus::from_report("Error"), DeviceStatus::Problem);
        assert_eq!(DeviceStatus::from_report("Degraded"), DeviceStatus::Problem);
        assert_eq!(DeviceStatus::from_report(""), DeviceStatus::Unknown);
    }

    #[test]
    fn category_parses_from_cli_tokens() {
        assert_eq!("audio".parse::<DeviceCategory>().unwrap(), DeviceCategory::Audio);
        assert_eq!("ALL".parse::<DeviceCategory>().unwrap(), DeviceCategory::All);
        assert!("hid".parse::<DeviceCategory>().is_err());
    }

    #[test]
    fn nameless_device_falls_back_to_instance_id() {
        let dev = PnpDevice::new(r"USB\VID_0000\1", "", "MEDIA");
        assert_eq!(dev.display_name(), r"USB\VID_0000\1");
    }
}
