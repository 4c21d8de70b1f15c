//! Mock sensor and relay families.
//!
//! First-class drivers for development and testing without physical
//! hardware; they are registered like any other family and constructed
//! through the normal factories.
//!
//! The mock sensor's address is `value[,fail_count]`: it reports `value`
//! for both of its measurement kinds, failing the first `fail_count` reads
//! (which exercises the retry path). Its handle exposes the number of
//! physical reads performed, which is what the single-flight and
//! retry-bound tests count.

use crate::Address;
use crate::bus::Platform;
use crate::drivers::{RelayHandle, SensorHandle, handle_mismatch};
use crate::traits::{HardwareDescriptor, RelayDescriptor, RelayDriver, SensorDriver};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use vivarium_core::{Error, MeasurementBundle, MeasurementKind, Result};

/// Hardware-type identifier for the mock sensor family.
pub const HARDWARE: &str = "mock";

/// Registry descriptor for the mock sensor family.
pub static DESCRIPTOR: HardwareDescriptor = HardwareDescriptor {
    hardware: HARDWARE,
    name: "Mock sensor",
    kinds: &["temperature", "humidity"],
};

/// Hardware-type identifier for the mock relay family.
pub const RELAY_HARDWARE: &str = "mock";

/// Registry descriptor for the mock relay family.
pub static RELAY_DESCRIPTOR: RelayDescriptor = RelayDescriptor {
    hardware: RELAY_HARDWARE,
    name: "Mock relay",
    dimmer: false,
};

/// Mock sensor driver.
#[derive(Debug, Clone)]
pub struct MockSensor {
    value: f64,
    fail_count: u32,
}

impl MockSensor {
    /// Parse the `value[,fail_count]` address shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the value segment is missing or
    /// not a float, or the fail count is not an integer.
    pub fn from_address(address: &Address) -> Result<Self> {
        let value = address
            .segment(0)
            .and_then(|segment| segment.parse::<f64>().ok())
            .ok_or_else(|| {
                Error::invalid_address(address.as_str(), "mock address needs a float value")
            })?;

        let fail_count = match address.segment(1) {
            None => 0,
            Some(segment) => segment.parse::<u32>().map_err(|_| {
                Error::invalid_address(address.as_str(), "fail count must be an integer")
            })?,
        };

        Ok(Self { value, fail_count })
    }
}

impl SensorDriver for MockSensor {
    fn descriptor(&self) -> &'static HardwareDescriptor {
        &DESCRIPTOR
    }

    async fn load_hardware(&self, _platform: &dyn Platform) -> Result<SensorHandle> {
        Ok(SensorHandle::Mock(Arc::new(MockSensorState::new(
            self.value,
            self.fail_count,
        ))))
    }

    async fn read(&self, handle: &SensorHandle) -> Result<MeasurementBundle> {
        let SensorHandle::Mock(state) = handle else {
            return Err(handle_mismatch(HARDWARE));
        };

        state.reads.fetch_add(1, Ordering::SeqCst);

        let failed = state
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::bus("injected mock read failure"));
        }

        let value = state.value();
        let mut bundle = MeasurementBundle::new();
        bundle.insert(MeasurementKind::new("temperature")?, value);
        bundle.insert(MeasurementKind::new("humidity")?, value);
        Ok(bundle)
    }
}

/// Shared state behind a mock sensor handle.
///
/// Like any hardware handle, this is cached per physical address and shared
/// by every logical sensor on that address, which is exactly what makes
/// its read counter usable to verify single-flight behavior.
#[derive(Debug)]
pub struct MockSensorState {
    value: Mutex<f64>,
    fail_remaining: AtomicU32,
    reads: AtomicUsize,
}

impl MockSensorState {
    fn new(value: f64, fail_count: u32) -> Self {
        Self {
            value: Mutex::new(value),
            fail_remaining: AtomicU32::new(fail_count),
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of physical reads performed through this handle.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make the next `count` reads fail.
    pub fn fail_next(&self, count: u32) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Change the reported value.
    pub fn set_value(&self, value: f64) {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }

    /// The currently reported value.
    #[must_use]
    pub fn value(&self) -> f64 {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Mock relay driver.
#[derive(Debug, Clone)]
pub struct MockRelay;

impl MockRelay {
    /// Mock relays accept any address; the segments carry no meaning.
    #[must_use]
    pub fn from_address(_address: &Address) -> Self {
        Self
    }
}

impl RelayDriver for MockRelay {
    fn descriptor(&self) -> &'static RelayDescriptor {
        &RELAY_DESCRIPTOR
    }

    async fn load_hardware(&self, _platform: &dyn Platform) -> Result<RelayHandle> {
        Ok(RelayHandle::Mock(Arc::new(MockRelayState::default())))
    }

    async fn set_value(&self, handle: &RelayHandle, percent: f64) -> Result<()> {
        let RelayHandle::Mock(state) = handle else {
            return Err(handle_mismatch(RELAY_HARDWARE));
        };

        *state.value.lock().unwrap_or_else(|e| e.into_inner()) = percent;
        state.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn value(&self, handle: &RelayHandle) -> Result<f64> {
        let RelayHandle::Mock(state) = handle else {
            return Err(handle_mismatch(RELAY_HARDWARE));
        };

        Ok(*state.value.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

/// Shared state behind a mock relay handle.
#[derive(Debug, Default)]
pub struct MockRelayState {
    value: Mutex<f64>,
    writes: AtomicUsize,
}

impl MockRelayState {
    /// Number of state writes performed through this handle.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The last written state.
    #[must_use]
    pub fn value(&self) -> f64 {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPlatform;

    #[test]
    fn address_parses_value_and_fail_count() {
        let sensor = MockSensor::from_address(&Address::new("21.5").unwrap()).unwrap();
        assert_eq!(sensor.value, 21.5);
        assert_eq!(sensor.fail_count, 0);

        let sensor = MockSensor::from_address(&Address::new("21.5,2").unwrap()).unwrap();
        assert_eq!(sensor.fail_count, 2);

        assert!(MockSensor::from_address(&Address::new("warm").unwrap()).is_err());
    }

    #[tokio::test]
    async fn reads_fail_until_the_injected_count_is_spent() {
        let sensor = MockSensor::from_address(&Address::new("21.5,2").unwrap()).unwrap();
        let platform = MockPlatform::new();
        let handle = sensor.load_hardware(&platform).await.unwrap();

        assert!(sensor.read(&handle).await.is_err());
        assert!(sensor.read(&handle).await.is_err());

        let bundle = sensor.read(&handle).await.unwrap();
        let temperature = MeasurementKind::new("temperature").unwrap();
        assert_eq!(bundle.get(&temperature), Some(21.5));

        let SensorHandle::Mock(state) = &handle else {
            unreachable!("mock driver produced a foreign handle");
        };
        assert_eq!(state.reads(), 3);
    }

    #[tokio::test]
    async fn relay_records_writes() {
        let relay = MockRelay::from_address(&Address::new("1").unwrap());
        let platform = MockPlatform::new();
        let handle = relay.load_hardware(&platform).await.unwrap();

        relay.set_value(&handle, 100.0).await.unwrap();
        assert_eq!(relay.value(&handle).await.unwrap(), 100.0);

        let RelayHandle::Mock(state) = &handle else {
            unreachable!("mock relay produced a foreign handle");
        };
        assert_eq!(state.writes(), 1);
    }
}
