//! SHT2x/HTU21D-style digital I2C sensor family.
//!
//! Covers the Sensirion SHT2x and compatible chips (HTU21D, SI7021) that
//! report temperature and humidity through no-hold-master conversions. The
//! address is `i2c_addr[,bus]`; a bare hex segment like `"40"` resolves to
//! `0x40`, and the bus defaults to 1 (the user-facing bus on a Raspberry
//! Pi).
//!
//! One physical read produces both kinds in a single bundle, so a
//! temperature instance and a humidity instance configured on the same chip
//! share one conversion pass.

use crate::Address;
use crate::bus::Platform;
use crate::drivers::{I2cTarget, SensorHandle, handle_mismatch};
use crate::traits::{HardwareDescriptor, SensorDriver};
use std::time::Duration;
use tokio::time::sleep;
use vivarium_core::{Error, MeasurementBundle, MeasurementKind, Result};

/// Hardware-type identifier for this family.
pub const HARDWARE: &str = "sht2x";

/// Registry descriptor for this family.
pub static DESCRIPTOR: HardwareDescriptor = HardwareDescriptor {
    hardware: HARDWARE,
    name: "SHT2x/HTU21D",
    kinds: &["temperature", "humidity"],
};

/// I2C bus used when the address omits a bus segment.
const DEFAULT_BUS: u8 = 1;

// Datasheet command set (no-hold-master mode).
const SOFT_RESET: u8 = 0xFE;
const SOFT_RESET_DELAY: Duration = Duration::from_millis(100);

const TEMPERATURE_TRIGGER_NO_HOLD: u8 = 0xF3;
const TEMPERATURE_WAIT: Duration = Duration::from_millis(100);

const HUMIDITY_TRIGGER_NO_HOLD: u8 = 0xF5;
const HUMIDITY_WAIT: Duration = Duration::from_millis(100);

/// SHT2x-family sensor driver.
#[derive(Debug, Clone)]
pub struct Sht2xSensor {
    address: u16,
    bus: u8,
}

impl Sht2xSensor {
    /// Parse the `i2c_addr[,bus]` address shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the chip address segment is
    /// missing or not a hex number.
    pub fn from_address(address: &Address) -> Result<Self> {
        let chip = address.i2c_segment(0)?.ok_or_else(|| {
            Error::invalid_address(address.as_str(), "I2C address needs a chip segment")
        })?;
        let bus = address.numeric_segment(1)?.unwrap_or(DEFAULT_BUS);

        Ok(Self { address: chip, bus })
    }

    /// The chip's I2C address.
    #[must_use]
    pub fn i2c_address(&self) -> u16 {
        self.address
    }

    /// The I2C bus number.
    #[must_use]
    pub fn bus(&self) -> u8 {
        self.bus
    }

    async fn read_word(&self, target: &I2cTarget, trigger: u8, wait: Duration) -> Result<(u8, u8)> {
        target.bus.write_byte(target.address, trigger)?;
        sleep(wait).await;

        let first = target.bus.read_byte(target.address)?;
        // Some chips NAK the second byte of a conversion; reuse the first
        // byte rather than failing the whole read.
        let second = target.bus.read_byte(target.address).unwrap_or(first);

        Ok((first, second))
    }

    pub(crate) fn temperature_from_raw(raw: (u8, u8)) -> f64 {
        ((f64::from(raw.0) * 256.0 + f64::from(raw.1)) * 175.72 / 65536.0) - 46.85
    }

    pub(crate) fn humidity_from_raw(raw: (u8, u8)) -> f64 {
        ((f64::from(raw.0) * 256.0 + f64::from(raw.1)) * 125.0 / 65536.0) - 6.0
    }
}

impl SensorDriver for Sht2xSensor {
    fn descriptor(&self) -> &'static HardwareDescriptor {
        &DESCRIPTOR
    }

    async fn load_hardware(&self, platform: &dyn Platform) -> Result<SensorHandle> {
        let bus = platform.open_i2c(self.bus)?;
        Ok(SensorHandle::I2c(I2cTarget {
            address: self.address,
            bus,
        }))
    }

    async fn read(&self, handle: &SensorHandle) -> Result<MeasurementBundle> {
        let SensorHandle::I2c(target) = handle else {
            return Err(handle_mismatch(HARDWARE));
        };

        // Datasheet recommends a soft reset before measuring.
        target.bus.write_byte(target.address, SOFT_RESET)?;
        sleep(SOFT_RESET_DELAY).await;

        let mut bundle = MeasurementBundle::new();

        let raw = self
            .read_word(target, TEMPERATURE_TRIGGER_NO_HOLD, TEMPERATURE_WAIT)
            .await?;
        bundle.insert(
            MeasurementKind::new("temperature")?,
            Self::temperature_from_raw(raw),
        );

        let raw = self
            .read_word(target, HUMIDITY_TRIGGER_NO_HOLD, HUMIDITY_WAIT)
            .await?;
        bundle.insert(
            MeasurementKind::new("humidity")?,
            Self::humidity_from_raw(raw),
        );

        Ok(bundle)
    }
}
