//! Device layer: snapshot, classification, blacklist filtering.

pub mod classify;
pub mod enumerator;
pub mod model;

pub use classify::{classify, filter_blacklisted};
pub use enumerator::snapshot;
pub use model::{DeviceCategory, DeviceError, DeviceStatus, PnpDevice};
