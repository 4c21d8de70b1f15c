//! Timing, retry, and polling constants for the device framework.
//!
//! These values govern how the controller talks to physical hardware: how
//! often a measurement may be repeated, how long to back off between retry
//! attempts, and how long a reading stays valid in the shared cache. They are
//! derived from the behavior of the supported sensor families (slow I2C
//! conversions, moisture probes that corrode under constant power). Changing
//! them changes the polling characteristics of every device in the system.
//!
//! # Usage
//!
//! ```
//! use vivarium_core::constants::*;
//!
//! assert_eq!(RETRY_ATTEMPTS, 3);
//! assert!(RETRY_INITIAL_DELAY < RETRY_MAX_DELAY);
//! ```

use std::time::Duration;

// -------------------------------------------------------------------------
// Retry behavior
// -------------------------------------------------------------------------

/// Number of attempts for hardware loading and measurements before giving up.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Delay before the first retry attempt. Doubles per attempt up to
/// [`RETRY_MAX_DELAY`].
pub const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on the delay between retry attempts.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(2);

// -------------------------------------------------------------------------
// Measurement pipeline
// -------------------------------------------------------------------------

/// How long a measurement bundle stays valid in the shared reading cache.
///
/// Several logical sensors on one physical chip share a single bundle; within
/// this window they all read from cache instead of re-measuring.
pub const MEASUREMENT_TTL: Duration = Duration::from_secs(30);

/// Settle time between energizing a power-managed sensor and measuring.
///
/// Moisture probes are kept unpowered between polls to prevent electrode
/// corrosion; they need a short moment after power-up before the reading is
/// stable.
pub const POWER_SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Consecutive out-of-limit readings required before an erratic value is
/// promoted to the new accepted value.
pub const ERRATIC_PROMOTE_THRESHOLD: u32 = 5;

// -------------------------------------------------------------------------
// Analog sampling
// -------------------------------------------------------------------------

/// Number of voltage samples taken per analog measurement.
pub const ANALOG_SAMPLE_COUNT: usize = 5;

/// Pause between consecutive analog voltage samples.
pub const ANALOG_SAMPLE_DELAY: Duration = Duration::from_millis(200);

// -------------------------------------------------------------------------
// Relay states
// -------------------------------------------------------------------------

/// Relay fully on (dimmers: 100% duty).
pub const RELAY_ON: f64 = 100.0;

/// Relay fully off.
pub const RELAY_OFF: f64 = 0.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delays_are_ordered() {
        assert!(RETRY_INITIAL_DELAY < RETRY_MAX_DELAY);
        // Two doublings from the initial delay reach the cap exactly.
        assert_eq!(RETRY_INITIAL_DELAY * 4, RETRY_MAX_DELAY);
    }

    #[test]
    fn relay_states_span_percent_range() {
        assert_eq!(RELAY_OFF, 0.0);
        assert_eq!(RELAY_ON, 100.0);
    }
}
