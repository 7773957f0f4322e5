//! Device classification and blacklist filtering.
//!
//! Classification is a pure function over a device snapshot: only healthy
//! USB-attached devices are considered, and category membership is decided
//! by name tokens and setup class tags. Enumeration order is preserved.

use crate::config::BlacklistEntry;

use super::model::{DeviceCategory, PnpDevice};

/// Name substrings that mark a device as an audio endpoint.
const AUDIO_NAME_TOKENS: [&str; 5] = ["audio", "sound", "headset", "speaker", "microphone"];

/// Setup classes that mark a device as an audio endpoint.
const AUDIO_CLASSES: [&str; 2] = ["AudioEndpoint", "MEDIA"];

/// Name substrings admitted by the `all` category on top of audio.
const INPUT_NAME_TOKENS: [&str; 2] = ["mouse", "keyboard"];

/// Setup classes admitted by the `all` category on top of audio.
const INPUT_CLASSES: [&str; 3] = ["HIDClass", "Mouse", "Keyboard"];

fn name_matches(name: &str, tokens: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    tokens.iter().any(|t| lower.contains(t))
}

fn class_matches(class: &str, classes: &[&str]) -> bool {
    classes.iter().any(|c| class.eq_ignore_ascii_case(c))
}

fn is_audio(device: &PnpDevice) -> bool {
    name_matches(&device.friendly_name, &AUDIO_NAME_TOKENS)
        || class_matches(&device.class_name, &AUDIO_CLASSES)
}

fn is_input(device: &PnpDevice) -> bool {
    name_matches(&device.friendly_name, &INPUT_NAME_TOKENS)
        || class_matches(&device.class_name, &INPUT_CLASSES)
}

/// Filter a snapshot down to the devices a category targets.
pub fn classify(devices: &[PnpDevice], category: DeviceCategory) -> Vec<PnpDevice> {
    devices
        .iter()
        .filter(|d| d.is_ok() && d.is_usb())
        .filter(|d| match category {
            DeviceCategory::Audio => is_audio(d),
            DeviceCategory::All => is_audio(d) || is_input(d),
        })
        .cloned()
        .collect()
}

/// Drop blacklisted devices from a classified set.
///
/// A device is excluded when its instance id or its friendly name equals the
/// corresponding field of any blacklist entry. Returns the surviving devices
/// and the number excluded.
pub fn filter_blacklisted(
    devices: Vec<PnpDevice>,
    blacklist: &[BlacklistEntry],
) -> (Vec<PnpDevice>, usize) {
    let before = devices.len();
    let included: Vec<PnpDevice> = devices
        .into_iter()
        .filter(|d| {
            !blacklist
                .iter()
                .any(|b| b.instance_id == d.instance_id || b.friendly_name == d.friendly_name)
        })
        .collect();
    let excluded = before - included.len();
    (included, excluded)
}
