//! Bus and platform seams between the device framework and real wiring.
//!
//! Concrete register maps, SPI/I2C wiring, and vendor SDKs are not part of
//! this crate: they live behind the small object-safe traits defined here,
//! supplied by the embedding application through a [`Platform`]
//! implementation. The framework ships [`MockPlatform`](crate::mock::MockPlatform)
//! for development and testing; a deployment on real hardware provides its
//! own `Platform` backed by the board's GPIO/I2C/SPI stack.
//!
//! # Why synchronous traits?
//!
//! Bus operations are short register pokes; the multi-millisecond waits the
//! datasheets require (conversion times, power settle) are owned by the async
//! driver layer, which interleaves `tokio::time::sleep` between bus calls.
//! Keeping these traits synchronous also keeps them object-safe: native
//! `async fn` in traits (RPITIT) cannot be boxed, and platforms are chosen at
//! runtime by the embedder, so `Arc<dyn I2cBus>` must work.

use std::fmt;
use std::sync::Arc;
use vivarium_core::Result;

/// A single analog input channel (e.g. one MCP3008 channel).
pub trait AnalogSource: Send + Sync + fmt::Debug {
    /// Read the current voltage as a fraction of the reference voltage
    /// (`0.0..=1.0` for an ADC at full scale).
    ///
    /// # Errors
    ///
    /// Returns an error if the converter cannot be read.
    fn read_voltage(&self) -> Result<f64>;
}

/// An I2C bus shared by every chip wired to it.
///
/// Implementations must serialize access internally: several device
/// instances may talk to different chip addresses on one bus concurrently.
pub trait I2cBus: Send + Sync + fmt::Debug {
    /// Write a single command/register byte to the chip at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chip does not acknowledge.
    fn write_byte(&self, address: u16, value: u8) -> Result<()>;

    /// Read a single byte from the chip at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chip does not respond.
    fn read_byte(&self, address: u16) -> Result<u8>;
}

/// A multi-channel PWM chip (e.g. PCA9685).
pub trait PwmChip: Send + Sync + fmt::Debug {
    /// Set the output frequency for the whole chip.
    ///
    /// # Errors
    ///
    /// Returns an error if the chip rejects the frequency.
    fn set_frequency(&self, hz: u32) -> Result<()>;

    /// Set the duty value for one channel (`0..=4095` on a 12-bit chip).
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be written.
    fn set_duty(&self, channel: u8, duty: u16) -> Result<()>;

    /// Read back the duty value of one channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be read.
    fn duty(&self, channel: u8) -> Result<u16>;
}

/// A GPIO line used for sensor power management.
///
/// Some probes (soil moisture electrodes in particular) corrode when kept
/// energized, so the framework powers them only around measurements.
pub trait PowerPin: Send + Sync + fmt::Debug {
    /// Drive the line high (`true`) or low (`false`).
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be driven.
    fn set_active(&self, active: bool) -> Result<()>;

    /// Current logical state of the line.
    fn is_active(&self) -> bool;
}

/// Factory for bus handles, supplied by the embedding application.
///
/// One `Platform` instance is shared by every device factory; drivers call
/// it from `load_hardware` to open the resource their parsed address points
/// at. Implementations should hand out shared handles for shared media (one
/// `I2cBus` per physical bus), since several devices may address chips on
/// the same wires.
pub trait Platform: Send + Sync + fmt::Debug {
    /// Open one analog input channel on a converter.
    ///
    /// # Errors
    ///
    /// Returns an error if the converter or channel is not available.
    fn open_analog(&self, channel: u8, device: u8) -> Result<Arc<dyn AnalogSource>>;

    /// Open (or reuse) the I2C bus with the given number.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus does not exist.
    fn open_i2c(&self, bus: u8) -> Result<Arc<dyn I2cBus>>;

    /// Open (or reuse) the PWM chip at `address` on I2C bus `bus`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chip is not reachable.
    fn open_pwm(&self, address: u16, bus: u8) -> Result<Arc<dyn PwmChip>>;

    /// Open a GPIO line for power management.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is unavailable.
    fn open_power_pin(&self, pin: u8) -> Result<Arc<dyn PowerPin>>;
}
