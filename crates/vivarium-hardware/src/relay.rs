//! Relay lifecycle controller.
//!
//! Relays follow the same framework as sensors (registry, tagged-variant
//! driver dispatch, handle caching with retry) with a state write/read pair
//! instead of the measurement pipeline. States are percentages: 0.0 off,
//! 100.0 fully on. Dimmer families accept intermediate values; plain
//! relays snap any non-zero request to fully on.

use crate::Address;
use crate::bus::Platform;
use crate::drivers::{AnyRelayDriver, RelayHandle};
use crate::retry;
use crate::traits::RelayDriver;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vivarium_cache::{CacheKey, Ttl, TtlCache};
use vivarium_core::constants::{RELAY_OFF, RELAY_ON, RETRY_ATTEMPTS};
use vivarium_core::{DeviceId, Error, Result};

/// One logical relay instance.
#[derive(Debug)]
pub struct Relay {
    id: DeviceId,
    name: String,
    address: Address,
    driver: AnyRelayDriver,
    platform: Arc<dyn Platform>,
    handle: Option<RelayHandle>,
    value: Option<f64>,
    last_update: Option<DateTime<Utc>>,
    handles: TtlCache<RelayHandle>,
}

impl Relay {
    pub(crate) fn new(
        id: DeviceId,
        name: String,
        address: Address,
        driver: AnyRelayDriver,
        platform: Arc<dyn Platform>,
        handles: TtlCache<RelayHandle>,
    ) -> Self {
        Self {
            id,
            name,
            address,
            driver,
            platform,
            handle: None,
            value: None,
            last_update: None,
            handles,
        }
    }

    /// Stable device identifier.
    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Display name. Empty until explicitly set.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the relay. Empty or whitespace-only names are ignored.
    pub fn set_name(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.name = name.to_string();
        }
    }

    /// The normalized address string.
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The hardware-type identifier of the driver family.
    #[must_use]
    pub fn hardware(&self) -> &'static str {
        self.driver.descriptor().hardware
    }

    /// Whether this family supports intermediate power levels.
    #[must_use]
    pub fn is_dimmer(&self) -> bool {
        self.driver.descriptor().dimmer
    }

    /// Last commanded (or read back) state as a percentage.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Whether the relay is currently delivering any power.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.value.is_some_and(|v| v > RELAY_OFF)
    }

    /// Time of the last successful state change or read-back.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// The driver-owned hardware handle, if loaded.
    #[must_use]
    pub fn handle(&self) -> Option<&RelayHandle> {
        self.handle.as_ref()
    }

    fn handle_cache_key(&self) -> CacheKey {
        CacheKey::derive(&["hw", self.hardware(), self.address.as_str()])
    }

    /// Acquire the hardware handle, reusing the process-wide cache.
    ///
    /// The platform hands relays on one multi-channel chip the same
    /// shared chip object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HardwareLoad`] naming this device when the driver
    /// still fails after retries.
    pub async fn load_hardware(&mut self, reload: bool) -> Result<()> {
        let key = self.handle_cache_key();

        if !reload && let Some(handle) = self.handles.get(&key) {
            self.handle = Some(handle);
            return Ok(());
        }

        debug!("Loading hardware for relay {self}");
        let driver = &self.driver;
        let platform = Arc::clone(&self.platform);

        let handle = retry::with_backoff(RETRY_ATTEMPTS, || driver.load_hardware(platform.as_ref()))
            .await
            .map_err(|e| Error::hardware_load(self.to_string(), e.to_string()))?;

        self.handles.set(key, handle.clone(), Ttl::Forever);
        self.handle = Some(handle);
        Ok(())
    }

    /// Drop the cached handle and load a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HardwareLoad`] if the fresh load fails.
    pub async fn reload(&mut self) -> Result<()> {
        self.load_hardware(true).await
    }

    /// Drive the relay to `percent` (0.0..=100.0).
    ///
    /// Non-dimmer relays snap any non-zero request to fully on. Returns the
    /// state actually commanded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for a percentage outside 0..=100,
    /// [`Error::NotLoaded`] before the first hardware load, and
    /// [`Error::State`] when the hardware still rejects the change after
    /// retries.
    pub async fn set_state(&mut self, percent: f64) -> Result<f64> {
        if !percent.is_finite() || !(RELAY_OFF..=RELAY_ON).contains(&percent) {
            return Err(Error::invalid_value(format!(
                "Relay state must be between {RELAY_OFF} and {RELAY_ON}, got {percent}"
            )));
        }

        let target = if self.is_dimmer() {
            percent
        } else if percent > RELAY_OFF {
            RELAY_ON
        } else {
            RELAY_OFF
        };

        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| Error::not_loaded(self.to_string()))?;

        retry::with_backoff(RETRY_ATTEMPTS, || self.driver.set_value(handle, target))
            .await
            .map_err(|e| Error::state(self.to_string(), e.to_string()))?;

        self.value = Some(target);
        self.last_update = Some(Utc::now());
        info!("Relay {self} switched to {target}%");
        Ok(target)
    }

    /// Switch fully on.
    ///
    /// # Errors
    ///
    /// See [`set_state`](Self::set_state).
    pub async fn turn_on(&mut self) -> Result<f64> {
        self.set_state(RELAY_ON).await
    }

    /// Switch fully off.
    ///
    /// # Errors
    ///
    /// See [`set_state`](Self::set_state).
    pub async fn turn_off(&mut self) -> Result<f64> {
        self.set_state(RELAY_OFF).await
    }

    /// Read the state back from the hardware.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first hardware load and
    /// [`Error::State`] when the hardware cannot be read.
    pub async fn state(&mut self) -> Result<f64> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| Error::not_loaded(self.to_string()))?;

        let value = self
            .driver
            .value(handle)
            .await
            .map_err(|e| Error::state(self.to_string(), e.to_string()))?;

        self.value = Some(value);
        Ok(value)
    }

    /// Release the relay instance.
    ///
    /// The cached chip handle stays available for siblings; an in-flight state
    /// change is never interrupted.
    pub fn stop(&mut self) {
        if self.handle.take().is_some() {
            info!("Stopped relay {self}");
        } else {
            warn!("Stopping relay {self} that was never loaded");
        }
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} named '{}' at address '{}'",
            self.driver.descriptor().name,
            self.name,
            self.address
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::MockRelay;
    use crate::mock::MockPlatform;

    fn mock_relay() -> Relay {
        let address = Address::new("1").unwrap();
        let driver = AnyRelayDriver::Mock(MockRelay::from_address(&address));

        Relay::new(
            DeviceId::derive(&["mock", address.as_str()]),
            "heat lamp".to_string(),
            address,
            driver,
            Arc::new(MockPlatform::new()),
            TtlCache::new(),
        )
    }

    #[test]
    fn display_names_driver_name_and_address() {
        let relay = mock_relay();
        assert_eq!(
            relay.to_string(),
            "Mock relay named 'heat lamp' at address '1'"
        );
    }

    #[tokio::test]
    async fn set_state_requires_a_loaded_handle() {
        let mut relay = mock_relay();
        let result = relay.set_state(100.0).await;
        assert!(matches!(result, Err(Error::NotLoaded { .. })));
    }

    #[tokio::test]
    async fn non_dimmer_states_snap_to_on_or_off() {
        let mut relay = mock_relay();
        relay.load_hardware(false).await.unwrap();

        assert_eq!(relay.set_state(30.0).await.unwrap(), RELAY_ON);
        assert!(relay.is_on());

        assert_eq!(relay.set_state(0.0).await.unwrap(), RELAY_OFF);
        assert!(!relay.is_on());
    }

    #[tokio::test]
    async fn out_of_range_states_are_rejected() {
        let mut relay = mock_relay();
        relay.load_hardware(false).await.unwrap();

        assert!(relay.set_state(150.0).await.is_err());
        assert!(relay.set_state(-5.0).await.is_err());
        assert!(relay.set_state(f64::NAN).await.is_err());
    }
}
