//! Sensor lifecycle controller and update pipeline.
//!
//! A [`Sensor`] owns one logical device: its identity, its parsed address,
//! its driver variant, and the state the API layer reads (`value`,
//! `last_update`, `erratic`). Around the driver's two extension points it
//! implements everything the framework guarantees:
//!
//! - **Handle acquisition**: handles are cached process-wide by
//!   `(hardware, address)`, so logical sensors sharing a chip share its
//!   handle; cache misses load through bounded retry with growing backoff.
//! - **Power sequencing**: a configured power-management line is energized
//!   250 ms before each measurement and released afterwards on every exit
//!   path, success or failure.
//! - **The update pipeline**: at most one in-flight measurement per
//!   physical address (single-flight gate in the reading cache), results
//!   cached for 30 s, measurement failures swallowed into "no new value" so
//!   one bad poll never crashes a polling loop.
//!
//! # Blocking behavior
//!
//! Retries sleep between attempts (0.5 s growing to 2 s), so
//! [`Sensor::update`] can take several seconds on failure paths. Pollers
//! run one task per device and are unaffected by a slow sibling.
//!
//! # Construction
//!
//! Sensors are built by the
//! [`SensorFactory`](crate::factory::SensorFactory), which resolves the
//! hardware type in the registry, validates the measurement kind, and
//! triggers the initial hardware load. Creating a sensor never performs a
//! measurement; the first poll does.

use crate::Address;
use crate::bus::{Platform, PowerPin};
use crate::drivers::{AnySensorDriver, SensorHandle};
use crate::retry;
use crate::traits::SensorDriver;
use crate::validator::{ReadingValidator, Verdict};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use vivarium_cache::{CacheKey, Ttl, TtlCache};
use vivarium_core::constants::{
    ERRATIC_PROMOTE_THRESHOLD, MEASUREMENT_TTL, POWER_SETTLE_DELAY, RETRY_ATTEMPTS,
};
use vivarium_core::{DeviceId, Error, MeasurementBundle, MeasurementKind, Result};

/// One logical sensor instance.
#[derive(Debug)]
pub struct Sensor {
    id: DeviceId,
    name: String,
    address: Address,
    kind: MeasurementKind,
    driver: AnySensorDriver,
    platform: Arc<dyn Platform>,
    handle: Option<SensorHandle>,
    power: Option<Arc<dyn PowerPin>>,
    validator: Option<Box<dyn ReadingValidator>>,
    value: Option<f64>,
    last_update: Option<DateTime<Utc>>,
    erratic_errors: u32,
    handles: TtlCache<SensorHandle>,
    readings: TtlCache<MeasurementBundle>,
}

impl Sensor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: DeviceId,
        name: String,
        address: Address,
        kind: MeasurementKind,
        driver: AnySensorDriver,
        platform: Arc<dyn Platform>,
        power: Option<Arc<dyn PowerPin>>,
        handles: TtlCache<SensorHandle>,
        readings: TtlCache<MeasurementBundle>,
    ) -> Self {
        Self {
            id,
            name,
            address,
            kind,
            driver,
            platform,
            handle: None,
            power,
            validator: None,
            value: None,
            last_update: None,
            erratic_errors: 0,
            handles,
            readings,
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

    /// Rename the sensor. Empty or whitespace-only names are ignored so a
    /// name, once set, can never be blanked.
    pub fn set_name(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.name = name.to_string();
        }
    }

    /// The normalized address string (what the persistence layer stores).
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The measurement kind this instance reports. Immutable once
    /// constructed.
    #[must_use]
    pub fn kind(&self) -> &MeasurementKind {
        &self.kind
    }

    /// The hardware-type identifier of the driver family.
    #[must_use]
    pub fn hardware(&self) -> &'static str {
        self.driver.descriptor().hardware
    }

    /// Last accepted value. `None` until the first successful read, then
    /// kept through transient outages.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Poll start time of the last accepted value.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Number of consecutive erratic readings currently suppressed.
    #[must_use]
    pub fn erratic(&self) -> u32 {
        self.erratic_errors
    }

    /// The driver-owned hardware handle, if loaded.
    #[must_use]
    pub fn handle(&self) -> Option<&SensorHandle> {
        self.handle.as_ref()
    }

    /// Install a reading validator (erratic-value suppression).
    ///
    /// Without one, every reading is accepted.
    pub fn set_validator(&mut self, validator: Box<dyn ReadingValidator>) {
        self.validator = Some(validator);
    }

    /// Remove the installed validator, if any.
    pub fn clear_validator(&mut self) {
        self.validator = None;
    }

    fn handle_cache_key(&self) -> CacheKey {
        CacheKey::derive(&["hw", self.hardware(), self.address.as_str()])
    }

    fn reading_cache_key(&self) -> CacheKey {
        CacheKey::derive(&[self.hardware(), self.address.as_str()])
    }

    /// Acquire the hardware handle, reusing the process-wide cache.
    ///
    /// With `reload`, the cached handle is replaced by a freshly loaded one
    /// (serialized through the cache, so a concurrent reader never observes
    /// a half-replaced entry).
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

        debug!("Loading hardware for sensor {self}");
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
    /// This is the recovery path after a [`Error::HardwareLoad`]: the device
    /// stays unusable until a reload succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HardwareLoad`] if the fresh load fails.
    pub async fn reload(&mut self) -> Result<()> {
        self.load_hardware(true).await
    }

    async fn power_on(&self) -> Result<()> {
        if let Some(pin) = &self.power {
            debug!("Enable power to the sensor {self} now");
            pin.set_active(true)?;
            sleep(POWER_SETTLE_DELAY).await;
        }
        Ok(())
    }

    fn power_off(&self) {
        if let Some(pin) = &self.power {
            debug!("Close power to the sensor {self} now");
            if let Err(e) = pin.set_active(false) {
                warn!("Failed to power down sensor {self}: {e}");
            }
        }
    }

    async fn measure_once(&self, handle: &SensorHandle) -> Result<MeasurementBundle> {
        if let Err(e) = self.power_on().await {
            // Pairing: release whatever the failed enable left energized.
            self.power_off();
            error!("Sensor {self} has exception: {e}");
            return Err(Error::measurement(self.to_string()));
        }

        let result = self.driver.read(handle).await;
        self.power_off();

        match result {
            Ok(bundle) if !bundle.is_empty() => Ok(bundle),
            Ok(_) => Err(Error::measurement(self.to_string())),
            Err(e) => {
                error!("Sensor {self} has exception: {e}");
                Err(Error::measurement(self.to_string()))
            }
        }
    }

    /// Perform one physical measurement, power cycle included.
    ///
    /// The whole sequence retries up to three times with growing backoff.
    /// Prefer [`update`](Self::update), which adds caching and single-flight
    /// de-duplication on top.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first successful hardware
    /// load and [`Error::Measurement`] when every attempt fails.
    pub async fn measure(&self) -> Result<MeasurementBundle> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| Error::not_loaded(self.to_string()))?;

        retry::with_backoff(RETRY_ATTEMPTS, || self.measure_once(handle)).await
    }

    /// Get the current value, measuring only when needed.
    ///
    /// Reuses a cached, non-expired bundle unless `force`; otherwise
    /// measures if no other poller holds the in-flight gate for this
    /// physical address, caches the bundle for 30 s, and extracts this
    /// instance's kind. Measurement failures are logged and reported as
    /// `Ok(None)`, leaving the previous value untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] if no hardware handle has ever been
    /// acquired. Everything else surfaces as `Ok(None)`.
    pub async fn update(&mut self, force: bool) -> Result<Option<f64>> {
        if self.handle.is_none() {
            return Err(Error::not_loaded(self.to_string()));
        }

        let started = Utc::now();
        let key = self.reading_cache_key();
        let mut data = self.readings.get(&key);

        if (data.is_none() || force) && self.readings.set_running(&key) {
            debug!("Start getting new data from sensor {self}");
            match self.measure().await {
                Ok(bundle) => {
                    self.readings
                        .set(key.clone(), bundle.clone(), Ttl::For(MEASUREMENT_TTL));
                    data = Some(bundle);
                }
                Err(e) => {
                    error!("Error updating sensor {self}. Check your hardware! {e}");
                }
            }
            self.readings.clear_running(&key);
        }

        let current = data.and_then(|bundle| bundle.get(&self.kind));

        let Some(reading) = current else {
            // Drop the bundle so the next poll measures again instead of
            // re-serving a result that cannot satisfy this sensor.
            self.readings.clear(&key);
            return Ok(None);
        };

        let verdict = self
            .validator
            .as_ref()
            .map_or(Verdict::Accept, |v| v.validate(reading, self.value));

        match verdict {
            Verdict::Erratic if self.erratic_errors + 1 < ERRATIC_PROMOTE_THRESHOLD => {
                self.erratic_errors += 1;
                warn!(
                    "Measured value {reading} from sensor {self} is erratic compared to \
                     previous value {:?} ({} in a row)",
                    self.value, self.erratic_errors
                );
                Ok(None)
            }
            verdict => {
                if verdict == Verdict::Erratic {
                    warn!(
                        "After {ERRATIC_PROMOTE_THRESHOLD} erratic measurements the value \
                         {reading} is promoted to a valid value for sensor {self}"
                    );
                }
                self.erratic_errors = 0;
                self.value = Some(reading);
                self.last_update = Some(started);
                Ok(Some(reading))
            }
        }
    }

    /// Release the power-management resource.
    ///
    /// Does not interrupt an in-flight measurement retry loop; let pending
    /// polls finish first.
    pub fn stop(&mut self) {
        if let Some(pin) = self.power.take() {
            if let Err(e) = pin.set_active(false) {
                warn!("Failed to release power management for sensor {self}: {e}");
            }
        }
        info!("Stopped sensor {self}");
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} named '{}' at address '{}'",
            self.driver.descriptor().name,
            self.kind,
            self.name,
            self.address
        )
    }
}
