//! Driver contracts for the device framework.
//!
//! Every hardware family implements exactly two extension points per device
//! category: acquiring the driver-owned hardware handle, and using it (one
//! physical read for sensors, a state write/read pair for relays). The
//! lifecycle controllers in [`sensor`](crate::sensor) and
//! [`relay`](crate::relay) own everything around those calls: handle
//! caching, retry/backoff, power sequencing, and the update pipeline.
//!
//! All methods use native `async fn` (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro. Because RPITIT traits
//! are not object-safe, polymorphic dispatch goes through the enum wrappers
//! in [`drivers`](crate::drivers) ([`AnySensorDriver`](crate::drivers::AnySensorDriver),
//! [`AnyRelayDriver`](crate::drivers::AnyRelayDriver)) instead of
//! `Box<dyn SensorDriver>`.

#![allow(async_fn_in_trait)]

use crate::bus::Platform;
use crate::drivers::{RelayHandle, SensorHandle};
use vivarium_core::{MeasurementBundle, MeasurementKind, Result};

/// Static description of a sensor hardware family.
///
/// Each driver variant declares one of these; the registry indexes them by
/// the `hardware` identifier. An empty `kinds` slice marks a *universal*
/// driver (script/remote) that can produce any measurement kind known to the
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareDescriptor {
    /// Unique hardware-type identifier (the dispatch key, e.g. `"sht2x"`).
    pub hardware: &'static str,

    /// Human-readable hardware name (e.g. `"SHT2x/HTU21D"`).
    pub name: &'static str,

    /// Measurement kinds this family produces; empty means "any".
    pub kinds: &'static [&'static str],
}

impl HardwareDescriptor {
    /// True for drivers that accept any measurement kind.
    #[must_use]
    pub fn is_universal(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Whether this family can produce the given measurement kind.
    #[must_use]
    pub fn supports(&self, kind: &MeasurementKind) -> bool {
        self.is_universal() || self.kinds.contains(&kind.as_str())
    }
}

/// Static description of a relay hardware family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayDescriptor {
    /// Unique hardware-type identifier (e.g. `"pca9685-dimmer"`).
    pub hardware: &'static str,

    /// Human-readable hardware name.
    pub name: &'static str,

    /// Whether the family supports intermediate power levels. Non-dimmer
    /// relays snap requested states to fully on or fully off.
    pub dimmer: bool,
}

/// A sensor hardware family.
///
/// Implementations parse their variant-specific address shape at
/// construction time (before any hardware is touched) and keep the parsed
/// parameters; `load_hardware` then opens the resource through the
/// [`Platform`] seam and `read` performs one physical measurement.
///
/// Errors from both methods are retried by the lifecycle controller with
/// bounded backoff, so implementations report failures directly instead of
/// retrying internally.
pub trait SensorDriver: Send + Sync {
    /// The static descriptor for this family.
    fn descriptor(&self) -> &'static HardwareDescriptor;

    /// Open the driver-owned hardware resource.
    ///
    /// Handles are cached process-wide by the lifecycle controller, keyed by
    /// `(hardware, address)`; several logical sensors on one physical chip
    /// receive clones of the same handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be opened; the controller
    /// retries and then surfaces the failure as a hardware-load error.
    async fn load_hardware(&self, platform: &dyn Platform) -> Result<SensorHandle>;

    /// Perform one physical read, producing a measurement bundle.
    ///
    /// The bundle may contain several kinds at once; each logical sensor
    /// extracts its own. An empty bundle counts as a failed read.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware could not be read.
    async fn read(&self, handle: &SensorHandle) -> Result<MeasurementBundle>;
}

/// A relay hardware family.
pub trait RelayDriver: Send + Sync {
    /// The static descriptor for this family.
    fn descriptor(&self) -> &'static RelayDescriptor;

    /// Open the driver-owned hardware resource.
    ///
    /// Handles are cached process-wide, keyed by `(hardware, address)`, so
    /// a relay per channel on one chip reuses its cached per-address entry,
    /// and the platform hands all of them the same shared chip object.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be opened.
    async fn load_hardware(&self, platform: &dyn Platform) -> Result<RelayHandle>;

    /// Drive the relay to `percent` (0.0 = off, 100.0 = fully on).
    ///
    /// The lifecycle controller validates the range and snaps non-dimmer
    /// values before calling this.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    async fn set_value(&self, handle: &RelayHandle, percent: f64) -> Result<()>;

    /// Read back the current output state as a percentage.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be read.
    async fn value(&self, handle: &RelayHandle) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXED: HardwareDescriptor = HardwareDescriptor {
        hardware: "fixed",
        name: "Fixed",
        kinds: &["temperature"],
    };

    const UNIVERSAL: HardwareDescriptor = HardwareDescriptor {
        hardware: "universal",
        name: "Universal",
        kinds: &[],
    };

    #[test]
    fn fixed_descriptor_supports_only_declared_kinds() {
        let temperature = MeasurementKind::new("temperature").unwrap();
        let humidity = MeasurementKind::new("humidity").unwrap();

        assert!(!FIXED.is_universal());
        assert!(FIXED.supports(&temperature));
        assert!(!FIXED.supports(&humidity));
    }

    #[test]
    fn universal_descriptor_supports_everything() {
        let conductivity = MeasurementKind::new("conductivity").unwrap();

        assert!(UNIVERSAL.is_universal());
        assert!(UNIVERSAL.supports(&conductivity));
    }
}
