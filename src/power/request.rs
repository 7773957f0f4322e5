//! Override request value objects and variant generation.
//!
//! The power manager matches override identifiers against whatever string
//! the driver subsystem registered, which is not always the friendly name
//! visible in a device listing. Rather than guess, an apply run submits a
//! fixed set of identifier and flag combinations per device; the removal
//! path mirrors the same identifiers with an empty flag set.

use crate::device::PnpDevice;

/// A single power-request category that an override can suppress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideFlag {
    Display,
    System,
    AwayMode,
    Execution,
}

impl OverrideFlag {
    /// Token understood by the power-management interface.
    pub fn token(self) -> &'static str {
        match self {
            OverrideFlag::Display => "DISPLAY",
            OverrideFlag::System => "SYSTEM",
            OverrideFlag::AwayMode => "AWAYMODE",
            OverrideFlag::Execution => "EXECUTION",
        }
    }
}

/// One override registration: an identifier plus the request categories to
/// suppress for it. An empty flag list means "clear the override for this
/// identifier".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRequest {
    pub identifier: String,
    pub flags: Vec<OverrideFlag>,
}

impl OverrideRequest {
    pub fn set(identifier: impl Into<String>, flags: &[OverrideFlag]) -> Self {
        Self {
            identifier: identifier.into(),
            flags: flags.to_vec(),
        }
    }

    pub fn clear(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            flags: Vec::new(),
        }
    }

    /// True if this request clears an override instead of setting one.
    pub fn is_clear(&self) -> bool {
        self.flags.is_empty()
    }
}

const FLAGS_STANDARD: [OverrideFlag; 3] = [
    OverrideFlag::Display,
    OverrideFlag::System,
    OverrideFlag::AwayMode,
];

const FLAGS_SYSTEM_ONLY: [OverrideFlag; 1] = [OverrideFlag::System];

const FLAGS_WITH_EXECUTION: [OverrideFlag; 4] = [
    OverrideFlag::Display,
    OverrideFlag::System,
    OverrideFlag::AwayMode,
    OverrideFlag::Execution,
];

/// The identifier spellings the power manager might have on file for a
/// device, in submission order.
fn identifier_variants(friendly_name: &str, instance_id: &str) -> [String; 3] {
    [
        friendly_name.to_string(),
        format!("{friendly_name} ({instance_id})"),
        instance_id.to_string(),
    ]
}

/// All override registrations submitted for one device during apply.
///
/// Every identifier variant is paired with every flag set; the engine
/// submits each pair independently and never short-circuits, so the power
/// manager gets every spelling it could possibly match.
pub fn apply_variants(device: &PnpDevice) -> Vec<OverrideRequest> {
    let flag_sets: [&[OverrideFlag]; 3] =
        [&FLAGS_STANDARD, &FLAGS_SYSTEM_ONLY, &FLAGS_WITH_EXECUTION];

    let mut requests = Vec::with_capacity(9);
    for identifier in identifier_variants(&device.friendly_name, &device.instance_id) {
        for flags in flag_sets {
            requests.push(OverrideRequest::set(identifier.clone(), flags));
        }
    }
    requests
}

/// All clearing requests submitted for one recorded device during undo.
///
/// Mirrors the apply identifiers with empty flag sets, plus the bare
/// instance id with a single SYSTEM token for installs where only that
/// narrow form was accepted.
pub fn removal_variants(device_name: &str, instance_id: &str) -> Vec<OverrideRequest> {
    let mut requests: Vec<OverrideRequest> = identifier_variants(device_name, instance_id)
        .into_iter()
        .map(OverrideRequest::clear)
        .collect();
    requests.push(OverrideRequest::set(instance_id, &FLAGS_SYSTEM_ONLY));
    requests
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> PnpDevice {
        PnpDevice::new(r"USB\VID_046D&PID_0A8F\12345", "USB Headset", "MEDIA")
    }

    #[test]
    fn apply_produces_nine_distinct_variants() {
        let variants = apply_variants(&device());
        assert_eq!(variants.len(), 9);
        for (i, a) in variants.iter().enumerate() {
            for b in &variants[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(variants.iter().all(|v| !v.is_clear()));
    }

    #[test]
    fn apply_variant_order_starts_with_friendly_name() {
        let variants = apply_variants(&device());
        assert_eq!(variants[0].identifier, "USB Headset");
        assert_eq!(variants[0].flags, FLAGS_STANDARD.to_vec());
        assert_eq!(variants[1].flags, FLAGS_SYSTEM_ONLY.to_vec());
        assert_eq!(variants[2].flags, FLAGS_WITH_EXECUTION.to_vec());
        assert_eq!(
            variants[3].identifier,
            r"USB Headset (USB\VID_046D&PID_0A8F\12345)"
        );
        assert_eq!(variants[6].identifier, r"USB\VID_046D&PID_0A8F\12345");
    }

    #[test]
    fn removal_mirrors_identifiers_with_clear_requests() {
        let variants = removal_variants("USB Headset", r"USB\VID_046D&PID_0A8F\12345");
        assert_eq!(variants.len(), 4);
        assert!(variants[0].is_clear());
        assert!(variants[1].is_clear());
        assert!(variants[2].is_clear());
        assert_eq!(variants[0].identifier, "USB Headset");
        assert_eq!(variants[2].identifier, r"USB\VID_046D&PID_0A8F\12345");
        // narrow fallback form
        assert_eq!(variants[3].identifier, r"USB\VID_046D&PID_0A8F\12345");
        assert_eq!(variants[3].flags, vec![OverrideFlag::System]);
    }

    #[test]
    fn flag_tokens_match_interface_spelling() {
        assert_eq!(OverrideFlag::AwayMode.token(), "AWAYMODE");
        assert_eq!(OverrideFlag::Execution.token(), "EXECUTION");
    }
}
