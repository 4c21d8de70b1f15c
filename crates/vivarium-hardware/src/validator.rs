//! Pluggable reading validation (erratic-value suppression).
//!
//! A sensor accepts every reading unless a validator is installed. With one
//! installed, readings the validator flags as erratic do not replace the
//! stored value immediately: the sensor counts consecutive erratic readings
//! and only promotes the new value once the count reaches
//! [`ERRATIC_PROMOTE_THRESHOLD`](vivarium_core::constants::ERRATIC_PROMOTE_THRESHOLD),
//! a stuck-probe heuristic that rides out single spikes but follows genuine
//! step changes.
//!
//! Validation is a strategy, not a built-in: nothing in the pipeline is
//! wired to a particular bounds policy, and deployments install whatever
//! validator fits the probe.
//!
//! # Examples
//!
//! ```
//! use vivarium_hardware::validator::{LimitValidator, ReadingValidator, Verdict};
//!
//! let validator = LimitValidator::new(0.0, 40.0).unwrap();
//! assert_eq!(validator.validate(21.5, None), Verdict::Accept);
//! assert_eq!(validator.validate(85.0, Some(21.5)), Verdict::Erratic);
//! ```

use std::fmt;
use vivarium_core::{Error, Result};

/// Outcome of validating one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The reading is trusted and becomes the stored value.
    Accept,

    /// The reading is outside configured bounds; count it, don't store it.
    Erratic,
}

/// A reading validation strategy.
pub trait ReadingValidator: Send + Sync + fmt::Debug {
    /// Judge a new reading against the previously accepted value.
    fn validate(&self, reading: f64, previous: Option<f64>) -> Verdict;
}

/// Validator that flags readings outside a fixed `[min, max]` range.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitValidator {
    min: f64,
    max: f64,
}

impl LimitValidator {
    /// Create a new limit validator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if `min` is not below `max` or either
    /// bound is not finite.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::invalid_value("Limits must be finite"));
        }
        if min >= max {
            return Err(Error::invalid_value(format!(
                "Lower limit {min} must be below upper limit {max}"
            )));
        }

        Ok(Self { min, max })
    }

    /// The lower bound.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// The upper bound.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }
}

impl ReadingValidator for LimitValidator {
    fn validate(&self, reading: f64, _previous: Option<f64>) -> Verdict {
        if reading >= self.min && reading <= self.max {
            Verdict::Accept
        } else {
            Verdict::Erratic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_must_be_ordered_and_finite() {
        assert!(LimitValidator::new(10.0, 5.0).is_err());
        assert!(LimitValidator::new(5.0, 5.0).is_err());
        assert!(LimitValidator::new(f64::NAN, 5.0).is_err());
        assert!(LimitValidator::new(0.0, f64::INFINITY).is_err());
        assert!(LimitValidator::new(-10.0, 50.0).is_ok());
    }

    #[test]
    fn readings_on_the_bounds_are_accepted() {
        let validator = LimitValidator::new(0.0, 100.0).unwrap();
        assert_eq!(validator.validate(0.0, None), Verdict::Accept);
        assert_eq!(validator.validate(100.0, None), Verdict::Accept);
        assert_eq!(validator.validate(100.1, None), Verdict::Erratic);
        assert_eq!(validator.validate(-0.1, None), Verdict::Erratic);
    }
}
