//! Process-wide shared device caches.
//!
//! The hardware-handle and measurement caches are shared by every device
//! instance in the process, so logical devices that point at the same
//! physical address reuse one handle and one in-flight measurement. Each
//! cache is initialized exactly once behind a `OnceLock`.
//!
//! Factories default to these shared instances; tests inject fresh caches
//! through [`SensorFactory::with_caches`](crate::factory::SensorFactory::with_caches)
//! to stay isolated from each other.

use crate::drivers::{RelayHandle, SensorHandle};
use std::sync::OnceLock;
use vivarium_cache::TtlCache;
use vivarium_core::MeasurementBundle;

/// The process-wide sensor hardware-handle cache.
pub fn sensor_handles() -> &'static TtlCache<SensorHandle> {
    static CACHE: OnceLock<TtlCache<SensorHandle>> = OnceLock::new();
    CACHE.get_or_init(TtlCache::new)
}

/// The process-wide measurement-result cache.
pub fn sensor_readings() -> &'static TtlCache<MeasurementBundle> {
    static CACHE: OnceLock<TtlCache<MeasurementBundle>> = OnceLock::new();
    CACHE.get_or_init(TtlCache::new)
}

/// The process-wide relay hardware-handle cache.
pub fn relay_handles() -> &'static TtlCache<RelayHandle> {
    static CACHE: OnceLock<TtlCache<RelayHandle>> = OnceLock::new();
    CACHE.get_or_init(TtlCache::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_caches_are_singletons() {
        assert!(std::ptr::eq(sensor_handles(), sensor_handles()));
        assert!(std::ptr::eq(sensor_readings(), sensor_readings()));
        assert!(std::ptr::eq(relay_handles(), relay_handles()));
    }
}
