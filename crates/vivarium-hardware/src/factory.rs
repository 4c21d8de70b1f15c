//! Device construction dispatchers.
//!
//! The factories turn a declarative spec into a live device instance:
//! resolve the hardware-type string in the registry, validate the requested
//! measurement kind against the resolved family, dispatch to the concrete
//! variant constructor (which parses the variant-specific address shape),
//! and trigger the initial hardware load. All validation happens before any
//! side effect: an unknown hardware type never touches a cache.
//!
//! Construction never measures: the first poll does.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use vivarium_hardware::config::SensorSpec;
//! use vivarium_hardware::factory::SensorFactory;
//! use vivarium_hardware::mock::MockPlatform;
//!
//! # #[tokio::main]
//! # async fn main() -> vivarium_core::Result<()> {
//! let factory = SensorFactory::new(Arc::new(MockPlatform::new()));
//!
//! let spec = SensorSpec::new("mock", "temperature", "21.5").with_name("Demo");
//! let sensor = factory.build(&spec).await?;
//!
//! assert_eq!(sensor.hardware(), "mock");
//! assert_eq!(sensor.value(), None); // no measurement at construction
//! # Ok(())
//! # }
//! ```

use crate::address::Address;
use crate::bus::Platform;
use crate::caches;
use crate::config::{RelaySpec, SensorSpec};
use crate::drivers::{AnyRelayDriver, AnySensorDriver, RelayHandle, SensorHandle};
use crate::registry;
use crate::relay::Relay;
use crate::sensor::Sensor;
use std::sync::Arc;
use tracing::info;
use vivarium_cache::TtlCache;
use vivarium_core::{DeviceId, Error, MeasurementBundle, MeasurementKind, Result};

/// Builds [`Sensor`] instances from specs.
#[derive(Debug, Clone)]
pub struct SensorFactory {
    platform: Arc<dyn Platform>,
    handles: TtlCache<SensorHandle>,
    readings: TtlCache<MeasurementBundle>,
}

impl SensorFactory {
    /// Create a factory over the process-wide shared caches.
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self::with_caches(
            platform,
            caches::sensor_handles().clone(),
            caches::sensor_readings().clone(),
        )
    }

    /// Create a factory with explicit caches.
    ///
    /// Tests use this to stay isolated from the process-wide instances.
    pub fn with_caches(
        platform: Arc<dyn Platform>,
        handles: TtlCache<SensorHandle>,
        readings: TtlCache<MeasurementBundle>,
    ) -> Self {
        Self {
            platform,
            handles,
            readings,
        }
    }

    /// Construct a sensor and acquire its hardware handle.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownHardware`] for an unregistered hardware type, with
    ///   no side effects.
    /// - [`Error::InvalidMeasurementKind`] when the resolved family does not
    ///   produce the requested kind.
    /// - [`Error::InvalidAddress`] / [`Error::InvalidValue`] for malformed
    ///   spec fields.
    /// - [`Error::HardwareLoad`] when the initial handle acquisition fails
    ///   after retries.
    pub async fn build(&self, spec: &SensorSpec) -> Result<Sensor> {
        let context = format!(
            "{} {} named '{}' at address '{}'",
            spec.hardware, spec.kind, spec.name, spec.address
        );

        let descriptor = registry::available_hardware()
            .get(spec.hardware.as_str())
            .copied()
            .ok_or_else(|| Error::unknown_hardware(&spec.hardware, &context))?;

        let kind = MeasurementKind::new(&spec.kind)
            .map_err(|_| Error::invalid_kind(&spec.kind, &context))?;
        if !descriptor.supports(&kind) {
            return Err(Error::invalid_kind(kind.as_str(), &context));
        }

        let address = Address::new(&spec.address)?;
        let driver = AnySensorDriver::for_hardware(descriptor.hardware, &address, &kind)?;

        let id = match &spec.id {
            Some(value) => DeviceId::new(value)?,
            None => DeviceId::derive(&[descriptor.hardware, address.as_str(), kind.as_str()]),
        };

        let power = match spec.power_pin {
            Some(pin) => Some(self.platform.open_power_pin(pin)?),
            None => None,
        };

        let mut sensor = Sensor::new(
            id,
            spec.name.trim().to_string(),
            address,
            kind,
            driver,
            Arc::clone(&self.platform),
            power,
            self.handles.clone(),
            self.readings.clone(),
        );

        // Acquire the handle now so wiring problems surface at startup.
        // No measurement happens here; that is up to the first poll.
        sensor.load_hardware(false).await?;
        info!("Loaded sensor {sensor}");

        Ok(sensor)
    }
}

/// Builds [`Relay`] instances from specs.
#[derive(Debug, Clone)]
pub struct RelayFactory {
    platform: Arc<dyn Platform>,
    handles: TtlCache<RelayHandle>,
}

impl RelayFactory {
    /// Create a factory over the process-wide shared handle cache.
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self::with_caches(platform, caches::relay_handles().clone())
    }

    /// Create a factory with an explicit handle cache.
    pub fn with_caches(platform: Arc<dyn Platform>, handles: TtlCache<RelayHandle>) -> Self {
        Self { platform, handles }
    }

    /// Construct a relay and acquire its hardware handle.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`SensorFactory::build`], minus the measurement-kind
    /// check (relays have none).
    pub async fn build(&self, spec: &RelaySpec) -> Result<Relay> {
        let context = format!(
            "{} named '{}' at address '{}'",
            spec.hardware, spec.name, spec.address
        );

        let descriptor = registry::available_relay_hardware()
            .get(spec.hardware.as_str())
            .copied()
            .ok_or_else(|| Error::unknown_hardware(&spec.hardware, &context))?;

        let address = Address::new(&spec.address)?;
        let driver = AnyRelayDriver::for_hardware(descriptor.hardware, &address)?;

        let id = match &spec.id {
            Some(value) => DeviceId::new(value)?,
            None => DeviceId::derive(&[descriptor.hardware, address.as_str()]),
        };

        let mut relay = Relay::new(
            id,
            spec.name.trim().to_string(),
            address,
            driver,
            Arc::clone(&self.platform),
            self.handles.clone(),
        );

        relay.load_hardware(false).await?;
        info!("Loaded relay {relay}");

        Ok(relay)
    }
}
