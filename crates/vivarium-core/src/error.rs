//! Error taxonomy for the device framework.
//!
//! The framework signals failures through a single closed set of tagged error
//! kinds. Every hardware-related variant carries a `device` context string
//! (the device's display identity) so that log lines and API responses can
//! name the exact sensor or relay that failed.
//!
//! # Propagation policy
//!
//! - Construction-time errors ([`Error::UnknownHardware`],
//!   [`Error::InvalidMeasurementKind`], [`Error::InvalidAddress`]) are caller
//!   errors and propagate immediately, without retries or side effects.
//! - Transient hardware errors are retried locally with bounded backoff
//!   before surfacing as [`Error::HardwareLoad`] or [`Error::Measurement`].
//! - Measurement failures after retries are swallowed by the update pipeline
//!   into "no new value" so a single bad poll never crashes a polling loop.

use thiserror::Error;

/// Result type alias for device framework operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, constructing, or polling devices.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested hardware type is not present in the registry.
    #[error("Unknown hardware type '{hardware}' for device {device}")]
    UnknownHardware { hardware: String, device: String },

    /// The requested measurement kind is not produced by the resolved driver.
    #[error("Hardware does not have a {kind} sensor for device {device}")]
    InvalidMeasurementKind { kind: String, device: String },

    /// Hardware handle acquisition failed after retries.
    ///
    /// Treated as a configuration/wiring problem: the device stays unusable
    /// until a reload is requested explicitly.
    #[error("Unable to load device {device}: {message}")]
    HardwareLoad { device: String, message: String },

    /// A measurement failed or produced no data after retries.
    #[error("Invalid reading from device {device}")]
    Measurement { device: String },

    /// `update()` was called before a hardware handle was ever acquired.
    #[error("Device {device} is not loaded! Can not update!")]
    NotLoaded { device: String },

    /// A relay state change or read-back failed after retries.
    #[error("Unable to switch device {device}: {message}")]
    State { device: String, message: String },

    /// The address string does not match the shape the driver expects.
    #[error("Invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    /// A value failed validation (measurement kind, device id, percentage).
    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    /// A script driver's external process failed or produced unusable output.
    #[error("Script failure for device {device}: {message}")]
    Script { device: String, message: String },

    /// A bus-level I/O failure (no ACK, dead channel, unreadable register).
    ///
    /// Bus errors surface from platform implementations and drivers; the
    /// lifecycle layer retries them and re-tags survivors with the owning
    /// device's identity.
    #[error("Bus error: {message}")]
    Bus { message: String },

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new unknown-hardware error.
    pub fn unknown_hardware(hardware: impl Into<String>, device: impl Into<String>) -> Self {
        Self::UnknownHardware {
            hardware: hardware.into(),
            device: device.into(),
        }
    }

    /// Create a new invalid-measurement-kind error.
    pub fn invalid_kind(kind: impl Into<String>, device: impl Into<String>) -> Self {
        Self::InvalidMeasurementKind {
            kind: kind.into(),
            device: device.into(),
        }
    }

    /// Create a new hardware-load error.
    pub fn hardware_load(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HardwareLoad {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a new measurement error.
    pub fn measurement(device: impl Into<String>) -> Self {
        Self::Measurement {
            device: device.into(),
        }
    }

    /// Create a new not-loaded error.
    pub fn not_loaded(device: impl Into<String>) -> Self {
        Self::NotLoaded {
            device: device.into(),
        }
    }

    /// Create a new relay-state error.
    pub fn state(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::State {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid-address error.
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid-value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    /// Create a new script error.
    pub fn script(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Script {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a new bus error.
    pub fn bus(message: impl Into<String>) -> Self {
        Self::Bus {
            message: message.into(),
        }
    }

    /// True for errors a caller caused at construction time.
    ///
    /// These are never retried; the caller must fix the request.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownHardware { .. }
                | Self::InvalidMeasurementKind { .. }
                | Self::InvalidAddress { .. }
                | Self::InvalidValue { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_hardware_display_names_device() {
        let error = Error::unknown_hardware("dht11", "temperature sensor 'rack 1'");
        assert!(matches!(error, Error::UnknownHardware { .. }));
        assert!(error.to_string().contains("dht11"));
        assert!(error.to_string().contains("rack 1"));
    }

    #[test]
    fn caller_errors_are_classified() {
        assert!(Error::unknown_hardware("x", "d").is_caller_error());
        assert!(Error::invalid_kind("pressure", "d").is_caller_error());
        assert!(Error::invalid_address("a,b", "too many segments").is_caller_error());
        assert!(!Error::hardware_load("d", "bus missing").is_caller_error());
        assert!(!Error::measurement("d").is_caller_error());
        assert!(!Error::not_loaded("d").is_caller_error());
    }

    #[test]
    fn measurement_display_matches_reference_wording() {
        let error = Error::measurement("moisture sensor 'bottom' at address '0'");
        assert_eq!(
            error.to_string(),
            "Invalid reading from device moisture sensor 'bottom' at address '0'"
        );
    }
}
