//! Driver families and their tagged-variant dispatch wrappers.
//!
//! Native `async fn` in traits (Edition 2024 RPITIT) is not object-safe, so
//! polymorphic driver dispatch cannot go through `Box<dyn SensorDriver>`.
//! Instead, every family is a variant of [`AnySensorDriver`] /
//! [`AnyRelayDriver`], and the construction dispatcher resolves a
//! hardware-type string to the right variant constructor at build time.
//! This keeps dispatch zero-cost, makes the available driver set statically
//! auditable, and leaves a clear evolution path: adding a family is one new
//! variant plus one registry entry.
//!
//! Hardware handles follow the same pattern: [`SensorHandle`] /
//! [`RelayHandle`] are cheaply cloneable tagged values that live in the
//! process-wide handle caches, so several logical devices on one physical
//! chip share the same underlying resource.

pub mod analog;
pub mod dimmer;
pub mod mock;
pub mod script;
pub mod sht2x;

pub use analog::AnalogSensor;
pub use dimmer::Pca9685Dimmer;
pub use mock::{MockRelay, MockRelayState, MockSensor, MockSensorState};
pub use script::ScriptSensor;
pub use sht2x::Sht2xSensor;

use crate::Address;
use crate::bus::{AnalogSource, I2cBus, Platform, PwmChip};
use crate::traits::{HardwareDescriptor, RelayDescriptor, RelayDriver, SensorDriver};
use std::path::PathBuf;
use std::sync::Arc;
use vivarium_core::{Error, MeasurementBundle, MeasurementKind, Result};

/// One chip on a shared I2C bus.
#[derive(Debug, Clone)]
pub struct I2cTarget {
    /// The chip's I2C address.
    pub address: u16,

    /// The shared bus the chip hangs off.
    pub bus: Arc<dyn I2cBus>,
}

/// One output channel on a shared PWM chip.
#[derive(Debug, Clone)]
pub struct PwmTarget {
    /// The output channel.
    pub channel: u8,

    /// The shared chip.
    pub chip: Arc<dyn PwmChip>,
}

/// The live, driver-owned resource behind a loaded sensor.
///
/// Opaque to everything but the owning driver family; the lifecycle
/// controller only caches and clones it.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SensorHandle {
    /// One ADC channel.
    Analog(Arc<dyn AnalogSource>),

    /// One chip on an I2C bus.
    I2c(I2cTarget),

    /// A validated executable path.
    Script(PathBuf),

    /// Mock state for development and testing.
    Mock(Arc<MockSensorState>),
}

/// The live, driver-owned resource behind a loaded relay.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum RelayHandle {
    /// One channel on a PWM chip.
    Pwm(PwmTarget),

    /// Mock state for development and testing.
    Mock(Arc<MockRelayState>),
}

/// Error for a driver handed a handle of the wrong family.
///
/// Can only happen through a programming error in the dispatch layer; it is
/// reported as a bus error and surfaces through the normal retry path.
pub(crate) fn handle_mismatch(family: &str) -> Error {
    Error::bus(format!("handle type mismatch: expected a {family} handle"))
}

/// Enum wrapper for sensor driver dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnySensorDriver {
    /// Analog (ADC) family.
    Analog(AnalogSensor),

    /// SHT2x/HTU21D I2C family.
    Sht2x(Sht2xSensor),

    /// Script family (universal kinds).
    Script(ScriptSensor),

    /// Mock family for development and testing.
    Mock(MockSensor),
    // Planned variants, pending platform seams for their buses:
    // - Ble(BleSensor) - Bluetooth LE broadcasters (Mi Flora etc.)
    // - Remote(RemoteSensor) - HTTP endpoints exposing JSON readings
}

impl AnySensorDriver {
    /// Construct the driver variant for a hardware-type identifier.
    ///
    /// The variant constructor parses the variant-specific address shape,
    /// so dispatch happens before any address interpretation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHardware`] for an unregistered identifier and
    /// the variant's own [`Error::InvalidAddress`] for a malformed address.
    pub fn for_hardware(
        hardware: &str,
        address: &Address,
        kind: &MeasurementKind,
    ) -> Result<Self> {
        match hardware {
            analog::HARDWARE => Ok(Self::Analog(AnalogSensor::from_address(address)?)),
            sht2x::HARDWARE => Ok(Self::Sht2x(Sht2xSensor::from_address(address)?)),
            script::HARDWARE => Ok(Self::Script(ScriptSensor::from_address(address, kind))),
            mock::HARDWARE => Ok(Self::Mock(MockSensor::from_address(address)?)),
            other => Err(Error::unknown_hardware(
                other,
                format!("at address '{address}'"),
            )),
        }
    }
}

impl SensorDriver for AnySensorDriver {
    fn descriptor(&self) -> &'static HardwareDescriptor {
        match self {
            Self::Analog(driver) => driver.descriptor(),
            Self::Sht2x(driver) => driver.descriptor(),
            Self::Script(driver) => driver.descriptor(),
            Self::Mock(driver) => driver.descriptor(),
        }
    }

    async fn load_hardware(&self, platform: &dyn Platform) -> Result<SensorHandle> {
        match self {
            Self::Analog(driver) => driver.load_hardware(platform).await,
            Self::Sht2x(driver) => driver.load_hardware(platform).await,
            Self::Script(driver) => driver.load_hardware(platform).await,
            Self::Mock(driver) => driver.load_hardware(platform).await,
        }
    }

    async fn read(&self, handle: &SensorHandle) -> Result<MeasurementBundle> {
        match self {
            Self::Analog(driver) => driver.read(handle).await,
            Self::Sht2x(driver) => driver.read(handle).await,
            Self::Script(driver) => driver.read(handle).await,
            Self::Mock(driver) => driver.read(handle).await,
        }
    }
}

/// Enum wrapper for relay driver dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyRelayDriver {
    /// PCA9685 PWM dimmer family.
    Pca9685(Pca9685Dimmer),

    /// Mock family for development and testing.
    Mock(MockRelay),
}

impl AnyRelayDriver {
    /// Construct the relay driver variant for a hardware-type identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHardware`] for an unregistered identifier and
    /// the variant's own [`Error::InvalidAddress`] for a malformed address.
    pub fn for_hardware(hardware: &str, address: &Address) -> Result<Self> {
        match hardware {
            dimmer::HARDWARE => Ok(Self::Pca9685(Pca9685Dimmer::from_address(address)?)),
            mock::RELAY_HARDWARE => Ok(Self::Mock(MockRelay::from_address(address))),
            other => Err(Error::unknown_hardware(
                other,
                format!("at address '{address}'"),
            )),
        }
    }
}

impl RelayDriver for AnyRelayDriver {
    fn descriptor(&self) -> &'static RelayDescriptor {
        match self {
            Self::Pca9685(driver) => driver.descriptor(),
            Self::Mock(driver) => driver.descriptor(),
        }
    }

    async fn load_hardware(&self, platform: &dyn Platform) -> Result<RelayHandle> {
        match self {
            Self::Pca9685(driver) => driver.load_hardware(platform).await,
            Self::Mock(driver) => driver.load_hardware(platform).await,
        }
    }

    async fn set_value(&self, handle: &RelayHandle, percent: f64) -> Result<()> {
        match self {
            Self::Pca9685(driver) => driver.set_value(handle, percent).await,
            Self::Mock(driver) => driver.set_value(handle, percent).await,
        }
    }

    async fn value(&self, handle: &RelayHandle) -> Result<f64> {
        match self {
            Self::Pca9685(driver) => driver.value(handle).await,
            Self::Mock(driver) => driver.value(handle).await,
        }
    }
}
