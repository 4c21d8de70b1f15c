//! Device registry: the statically auditable set of supported hardware.
//!
//! Driver families register through the explicit [`SENSOR_DRIVERS`] and
//! [`RELAY_DRIVERS`] lists; there is no filesystem or plugin scanning, so
//! the supported hardware set is visible in one place at compile time. The
//! lookup index is built once per process behind a `OnceLock` and cached
//! indefinitely.
//!
//! # Universal drivers
//!
//! A sensor family with an empty kind list (the script driver) accepts any
//! measurement kind; discovery listings expand it to the union of every
//! other family's kinds, plus the kinds in [`EXTRA_KINDS`] that are only
//! reachable through such drivers.
//!
//! # Examples
//!
//! ```
//! use vivarium_hardware::registry;
//!
//! let hardware = registry::available_hardware();
//! assert!(hardware.contains_key("sht2x"));
//!
//! for info in registry::available_devices() {
//!     println!("{}: {} ({:?})", info.hardware, info.name, info.kinds);
//! }
//! ```

use crate::drivers::{analog, dimmer, mock, script, sht2x};
use crate::traits::{HardwareDescriptor, RelayDescriptor};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use vivarium_core::MeasurementKind;

/// Every sensor driver family known to this build.
pub static SENSOR_DRIVERS: &[&HardwareDescriptor] = &[
    &analog::DESCRIPTOR,
    &sht2x::DESCRIPTOR,
    &script::DESCRIPTOR,
    &mock::DESCRIPTOR,
];

/// Every relay driver family known to this build.
pub static RELAY_DRIVERS: &[&RelayDescriptor] = &[&dimmer::DESCRIPTOR, &mock::RELAY_DESCRIPTOR];

/// Measurement kinds only reachable through universal drivers.
///
/// No built-in chip family produces these, but script/remote sensors can;
/// seeding them here keeps them offered by discovery endpoints.
pub static EXTRA_KINDS: &[&str] = &["conductivity"];

/// A discovery listing entry: one supported hardware family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareInfo {
    /// Hardware-type identifier (the construction dispatch key).
    pub hardware: String,

    /// Human-readable name.
    pub name: String,

    /// Measurement kinds the family offers. Universal families list the
    /// full known set.
    pub kinds: Vec<MeasurementKind>,
}

/// Map of hardware-type identifier to sensor family descriptor.
///
/// Built on first use and cached for the lifetime of the process.
pub fn available_hardware() -> &'static HashMap<&'static str, &'static HardwareDescriptor> {
    static INDEX: OnceLock<HashMap<&'static str, &'static HardwareDescriptor>> = OnceLock::new();

    INDEX.get_or_init(|| {
        SENSOR_DRIVERS
            .iter()
            .map(|descriptor| (descriptor.hardware, *descriptor))
            .collect()
    })
}

/// Map of hardware-type identifier to relay family descriptor.
pub fn available_relay_hardware() -> &'static HashMap<&'static str, &'static RelayDescriptor> {
    static INDEX: OnceLock<HashMap<&'static str, &'static RelayDescriptor>> = OnceLock::new();

    INDEX.get_or_init(|| {
        RELAY_DRIVERS
            .iter()
            .map(|descriptor| (descriptor.hardware, *descriptor))
            .collect()
    })
}

/// Sorted, deduplicated set of every measurement kind the registry can
/// produce.
pub fn available_kinds() -> Vec<MeasurementKind> {
    let mut kinds: Vec<MeasurementKind> = SENSOR_DRIVERS
        .iter()
        .flat_map(|descriptor| descriptor.kinds.iter())
        .chain(EXTRA_KINDS.iter())
        .filter_map(|kind| MeasurementKind::new(kind).ok())
        .collect();

    kinds.sort();
    kinds.dedup();
    kinds
}

/// Discovery listing of every sensor family, sorted by display name.
///
/// Universal families advertise the full known kind set.
pub fn available_devices() -> Vec<HardwareInfo> {
    let all_kinds = available_kinds();

    let mut devices: Vec<HardwareInfo> = SENSOR_DRIVERS
        .iter()
        .map(|descriptor| {
            let kinds = if descriptor.is_universal() {
                all_kinds.clone()
            } else {
                descriptor
                    .kinds
                    .iter()
                    .filter_map(|kind| MeasurementKind::new(kind).ok())
                    .collect()
            };

            HardwareInfo {
                hardware: descriptor.hardware.to_string(),
                name: descriptor.name.to_string(),
                kinds,
            }
        })
        .collect();

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    devices
}

/// Discovery listing of every relay family, sorted by display name.
pub fn available_relays() -> Vec<RelayInfo> {
    let mut relays: Vec<RelayInfo> = RELAY_DRIVERS
        .iter()
        .map(|descriptor| RelayInfo {
            hardware: descriptor.hardware.to_string(),
            name: descriptor.name.to_string(),
            dimmer: descriptor.dimmer,
        })
        .collect();

    relays.sort_by(|a, b| a.name.cmp(&b.name));
    relays
}

/// A discovery listing entry: one supported relay family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayInfo {
    /// Hardware-type identifier (the construction dispatch key).
    pub hardware: String,

    /// Human-readable name.
    pub name: String,

    /// Whether the family supports intermediate power levels.
    pub dimmer: bool,
}
