//! PCA9685 PWM dimmer relay family.
//!
//! Drives lights and heaters through a 16-channel, 12-bit PCA9685 PWM chip.
//! The address is `channel[,i2c_addr[,bus]]`; the chip address defaults to
//! the PCA9685 factory default `0x40` and the bus to 1. Several relays on
//! one chip share the chip object through the platform seam.
//!
//! States are percentages: 0.0 is off, 100.0 fully on, and intermediate
//! values map linearly onto the chip's duty range.

use crate::Address;
use crate::bus::Platform;
use crate::drivers::{PwmTarget, RelayHandle, handle_mismatch};
use crate::traits::{RelayDescriptor, RelayDriver};
use vivarium_core::{Error, Result};

/// Hardware-type identifier for this family.
pub const HARDWARE: &str = "pca9685-dimmer";

/// Registry descriptor for this family.
pub static DESCRIPTOR: RelayDescriptor = RelayDescriptor {
    hardware: HARDWARE,
    name: "PCA9685-dimmer",
    dimmer: true,
};

/// PWM frequency the chip is programmed to at load time.
const DIMMER_FREQUENCY: u32 = 1000;

/// Full-scale duty value (12-bit chip).
const DIMMER_MAX_DUTY: u16 = 4095;

/// PCA9685 factory-default I2C address.
const DEFAULT_ADDRESS: u16 = 0x40;

/// I2C bus used when the address omits a bus segment.
const DEFAULT_BUS: u8 = 1;

/// PCA9685 dimmer relay driver.
#[derive(Debug, Clone)]
pub struct Pca9685Dimmer {
    channel: u8,
    address: u16,
    bus: u8,
}

impl Pca9685Dimmer {
    /// Parse the `channel[,i2c_addr[,bus]]` address shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the channel segment is missing
    /// or any present segment does not parse.
    pub fn from_address(address: &Address) -> Result<Self> {
        let channel = address.numeric_segment(0)?.ok_or_else(|| {
            Error::invalid_address(address.as_str(), "dimmer address needs a channel")
        })?;
        let chip = address.i2c_segment(1)?.unwrap_or(DEFAULT_ADDRESS);
        let bus = address.numeric_segment(2)?.unwrap_or(DEFAULT_BUS);

        Ok(Self {
            channel,
            address: chip,
            bus,
        })
    }

    /// The chip output channel this relay drives.
    #[must_use]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// The chip's I2C address.
    #[must_use]
    pub fn i2c_address(&self) -> u16 {
        self.address
    }

    pub(crate) fn duty_from_percent(percent: f64) -> u16 {
        (f64::from(DIMMER_MAX_DUTY) * (percent / 100.0)).round() as u16
    }

    pub(crate) fn percent_from_duty(duty: u16) -> f64 {
        (f64::from(duty) / f64::from(DIMMER_MAX_DUTY) * 100.0).round()
    }
}

impl RelayDriver for Pca9685Dimmer {
    fn descriptor(&self) -> &'static RelayDescriptor {
        &DESCRIPTOR
    }

    async fn load_hardware(&self, platform: &dyn Platform) -> Result<RelayHandle> {
        let chip = platform.open_pwm(self.address, self.bus)?;
        chip.set_frequency(DIMMER_FREQUENCY)?;

        Ok(RelayHandle::Pwm(PwmTarget {
            channel: self.channel,
            chip,
        }))
    }

    async fn set_value(&self, handle: &RelayHandle, percent: f64) -> Result<()> {
        let RelayHandle::Pwm(target) = handle else {
            return Err(handle_mismatch(HARDWARE));
        };

        target
            .chip
            .set_duty(target.channel, Self::duty_from_percent(percent))
    }

    async fn value(&self, handle: &RelayHandle) -> Result<f64> {
        let RelayHandle::Pwm(target) = handle else {
            return Err(handle_mismatch(HARDWARE));
        };

        let duty = target.chip.duty(target.channel)?;
        Ok(Self::percent_from_duty(duty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_defaults_match_the_chip() {
        let dimmer = Pca9685Dimmer::from_address(&Address::new("3").unwrap()).unwrap();
        assert_eq!(dimmer.channel(), 3);
        assert_eq!(dimmer.i2c_address(), 0x40);
        assert_eq!(dimmer.bus, 1);
    }

    #[test]
    fn address_accepts_bare_hex_chip_segment() {
        let dimmer = Pca9685Dimmer::from_address(&Address::new("3,41,0").unwrap()).unwrap();
        assert_eq!(dimmer.i2c_address(), 0x41);
        assert_eq!(dimmer.bus, 0);
    }

    #[test]
    fn percent_maps_linearly_onto_duty() {
        assert_eq!(Pca9685Dimmer::duty_from_percent(0.0), 0);
        assert_eq!(Pca9685Dimmer::duty_from_percent(100.0), 4095);
        assert_eq!(Pca9685Dimmer::duty_from_percent(50.0), 2048);

        assert_eq!(Pca9685Dimmer::percent_from_duty(0), 0.0);
        assert_eq!(Pca9685Dimmer::percent_from_duty(4095), 100.0);
        assert_eq!(Pca9685Dimmer::percent_from_duty(2048), 50.0);
    }
}
