//! Analog (ADC) sensor family.
//!
//! Covers probes read through an analog-to-digital converter channel, such
//! as resistive soil-moisture electrodes on an MCP3008. The address is
//! `channel[,device]` where `device` selects the converter when several are
//! chained (defaults to 0).
//!
//! A single measurement takes [`ANALOG_SAMPLE_COUNT`] voltage samples spaced
//! [`ANALOG_SAMPLE_DELAY`] apart and reports the trimmed mean: samples are
//! sorted and the minimum and maximum discarded, which suppresses the
//! single-sample spikes these probes are prone to.

use crate::Address;
use crate::bus::Platform;
use crate::drivers::{SensorHandle, handle_mismatch};
use crate::traits::{HardwareDescriptor, SensorDriver};
use tokio::time::sleep;
use vivarium_core::constants::{ANALOG_SAMPLE_COUNT, ANALOG_SAMPLE_DELAY};
use vivarium_core::{Error, MeasurementBundle, MeasurementKind, Result};

/// Hardware-type identifier for this family.
pub const HARDWARE: &str = "analog";

/// Registry descriptor for this family.
pub static DESCRIPTOR: HardwareDescriptor = HardwareDescriptor {
    hardware: HARDWARE,
    name: "Analog (ADC)",
    kinds: &["moisture"],
};

/// Analog sensor driver.
#[derive(Debug, Clone)]
pub struct AnalogSensor {
    channel: u8,
    device: u8,
}

impl AnalogSensor {
    /// Parse the `channel[,device]` address shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the channel segment is missing
    /// or not numeric.
    pub fn from_address(address: &Address) -> Result<Self> {
        let channel = address.numeric_segment(0)?.ok_or_else(|| {
            Error::invalid_address(address.as_str(), "analog address needs a channel")
        })?;
        let device = address.numeric_segment(1)?.unwrap_or(0);

        Ok(Self { channel, device })
    }

    /// The converter channel this sensor reads.
    #[must_use]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// The converter (chip-select) index.
    #[must_use]
    pub fn device(&self) -> u8 {
        self.device
    }
}

impl SensorDriver for AnalogSensor {
    fn descriptor(&self) -> &'static HardwareDescriptor {
        &DESCRIPTOR
    }

    async fn load_hardware(&self, platform: &dyn Platform) -> Result<SensorHandle> {
        let source = platform.open_analog(self.channel, self.device)?;
        Ok(SensorHandle::Analog(source))
    }

    async fn read(&self, handle: &SensorHandle) -> Result<MeasurementBundle> {
        let SensorHandle::Analog(source) = handle else {
            return Err(handle_mismatch(HARDWARE));
        };

        let mut samples = Vec::with_capacity(ANALOG_SAMPLE_COUNT);
        for sample in 0..ANALOG_SAMPLE_COUNT {
            match source.read_voltage() {
                Ok(value) if value.is_finite() => samples.push(value),
                Ok(value) => tracing::debug!("Dropped non-finite analog sample {value}"),
                Err(error) => tracing::debug!("Dropped failed analog sample: {error}"),
            }

            if sample + 1 < ANALOG_SAMPLE_COUNT {
                sleep(ANALOG_SAMPLE_DELAY).await;
            }
        }

        // The trimmed mean needs at least one sample besides the discarded
        // minimum and maximum.
        if samples.len() < 3 {
            return Err(Error::bus("not enough valid analog samples"));
        }

        samples.sort_by(f64::total_cmp);
        let trimmed = &samples[1..samples.len() - 1];
        let mean = trimmed.iter().sum::<f64>() / trimmed.len() as f64;

        let mut bundle = MeasurementBundle::new();
        bundle.insert(MeasurementKind::new("moisture")?, mean);
        Ok(bundle)
    }
}
