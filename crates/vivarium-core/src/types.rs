//! Domain value types shared across hardware categories.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// A kind of measurement a sensor can produce (e.g. `temperature`,
/// `humidity`, `moisture`, `conductivity`).
///
/// Kinds are normalized (trimmed and lowercased) before validation so that
/// persisted configuration round-trips regardless of how the user typed them.
///
/// # Examples
///
/// ```
/// use vivarium_core::MeasurementKind;
///
/// let kind = MeasurementKind::new(" Temperature ").unwrap();
/// assert_eq!(kind.as_str(), "temperature");
///
/// assert!(MeasurementKind::new("").is_err());
/// assert!(MeasurementKind::new("rel humidity").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeasurementKind(String);

impl MeasurementKind {
    /// Create a new measurement kind with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the normalized kind is empty or
    /// contains characters outside `a-z`, `0-9` and `_`.
    pub fn new(kind: &str) -> Result<Self> {
        let kind = kind.trim().to_lowercase();

        if kind.is_empty() {
            return Err(Error::invalid_value("Measurement kind cannot be empty"));
        }

        if !kind
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(Error::invalid_value(format!(
                "Measurement kind must be lowercase alphanumeric, got '{kind}'"
            )));
        }

        Ok(MeasurementKind(kind))
    }

    /// Get the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MeasurementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MeasurementKind::new(s)
    }
}

/// Stable device identifier.
///
/// When not supplied explicitly, ids are derived deterministically from the
/// device's hardware type, address, and (for sensors) measurement kind, so
/// that the same configured device always resolves to the same identity
/// across process restarts.
///
/// # Examples
///
/// ```
/// use vivarium_core::DeviceId;
///
/// let a = DeviceId::derive(&["sht2x", "0x40", "temperature"]);
/// let b = DeviceId::derive(&["sht2x", "0x40", "temperature"]);
/// assert_eq!(a, b);
///
/// let c = DeviceId::derive(&["sht2x", "0x40", "humidity"]);
/// assert_ne!(a, c);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id from an explicitly supplied value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the trimmed value is empty. Any
    /// other non-empty string is accepted verbatim so ids persisted by older
    /// installations keep working.
    pub fn new(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::invalid_value("Device id cannot be empty"));
        }
        Ok(DeviceId(value.to_string()))
    }

    /// Derive a device id from identity parts.
    ///
    /// The derivation is a pure function: the same parts always produce the
    /// same id. Internally this is a v5 UUID over the joined parts, rendered
    /// as 32 hex characters.
    #[must_use]
    pub fn derive(parts: &[&str]) -> Self {
        let joined = parts.join(":");
        let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, joined.as_bytes());
        DeviceId(uuid.simple().to_string())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The result of one physical read: a map of measurement kind to value.
///
/// A single physical chip often produces several kinds at once (an SHT2x
/// reports temperature and humidity in one pass); every logical sensor
/// sharing that chip extracts its own kind from the same bundle.
///
/// # Examples
///
/// ```
/// use vivarium_core::{MeasurementBundle, MeasurementKind};
///
/// let temperature = MeasurementKind::new("temperature").unwrap();
///
/// let mut bundle = MeasurementBundle::new();
/// bundle.insert(temperature.clone(), 21.13);
///
/// assert_eq!(bundle.get(&temperature), Some(21.13));
/// assert_eq!(bundle.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementBundle(HashMap<MeasurementKind, f64>);

impl MeasurementBundle {
    /// Create an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value for a measurement kind.
    pub fn insert(&mut self, kind: MeasurementKind, value: f64) {
        self.0.insert(kind, value);
    }

    /// Get the value for a measurement kind, if present.
    #[must_use]
    pub fn get(&self, kind: &MeasurementKind) -> Option<f64> {
        self.0.get(kind).copied()
    }

    /// True if the bundle holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of measurement kinds in the bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over (kind, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&MeasurementKind, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }
}

impl FromIterator<(MeasurementKind, f64)> for MeasurementBundle {
    fn from_iter<T: IntoIterator<Item = (MeasurementKind, f64)>>(iter: T) -> Self {
        MeasurementBundle(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("temperature", "temperature")]
    #[case(" Humidity ", "humidity")]
    #[case("CO2", "co2")]
    #[case("light_level", "light_level")]
    fn measurement_kind_normalizes(#[case] input: &str, #[case] expected: &str) {
        let kind = MeasurementKind::new(input).unwrap();
        assert_eq!(kind.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("rel humidity")]
    #[case("temp,humidity")]
    fn measurement_kind_rejects_invalid(#[case] input: &str) {
        assert!(MeasurementKind::new(input).is_err());
    }

    #[test]
    fn measurement_kind_from_str() {
        let kind: MeasurementKind = "Moisture".parse().unwrap();
        assert_eq!(kind.as_str(), "moisture");
    }

    #[test]
    fn device_id_derivation_is_deterministic() {
        let a = DeviceId::derive(&["analog", "0,1", "moisture"]);
        let b = DeviceId::derive(&["analog", "0,1", "moisture"]);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn device_id_derivation_separates_parts() {
        // Joining with a separator keeps ("ab","c") and ("a","bc") distinct.
        let a = DeviceId::derive(&["ab", "c"]);
        let b = DeviceId::derive(&["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn device_id_override_requires_content() {
        assert!(DeviceId::new("  ").is_err());

        let id = DeviceId::new("  legacy-id-7  ").unwrap();
        assert_eq!(id.as_str(), "legacy-id-7");
    }

    #[test]
    fn bundle_round_trip() {
        let temperature = MeasurementKind::new("temperature").unwrap();
        let humidity = MeasurementKind::new("humidity").unwrap();

        let bundle: MeasurementBundle = [(temperature.clone(), 20.5), (humidity.clone(), 55.0)]
            .into_iter()
            .collect();

        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.get(&temperature), Some(20.5));
        assert_eq!(bundle.get(&humidity), Some(55.0));
        assert_eq!(bundle.get(&MeasurementKind::new("moisture").unwrap()), None);
    }

    #[test]
    fn bundle_serializes_as_map() {
        let kind = MeasurementKind::new("temperature").unwrap();
        let bundle: MeasurementBundle = [(kind, 21.0)].into_iter().collect();

        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["temperature"], 21.0);
    }
}
