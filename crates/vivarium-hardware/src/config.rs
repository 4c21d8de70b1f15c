//! Declarative device configuration.
//!
//! The persistence layer (or a TOML file, for standalone deployments) hands
//! the framework a list of device specs at startup; the factories turn them
//! into live [`Sensor`](crate::sensor::Sensor) and
//! [`Relay`](crate::relay::Relay) instances. Specs round-trip through serde
//! unchanged; in particular the address string is persisted verbatim.
//!
//! # Example TOML
//!
//! ```toml
//! [[sensors]]
//! hardware = "sht2x"
//! kind = "temperature"
//! address = "0x40"
//! name = "Terrarium top"
//!
//! [[sensors]]
//! hardware = "analog"
//! kind = "moisture"
//! address = "0,1"
//! name = "Soil bed"
//! power_pin = 17
//!
//! [[relays]]
//! hardware = "pca9685-dimmer"
//! address = "3"
//! name = "Basking lamp"
//! ```

use crate::factory::{RelayFactory, SensorFactory};
use crate::relay::Relay;
use crate::sensor::Sensor;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;
use vivarium_core::{Error, Result};

/// Configuration for one sensor instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Stable identifier. Omitted on first creation (a derived id is
    /// assigned); supplied when re-loading a persisted device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Hardware-type identifier (registry dispatch key).
    pub hardware: String,

    /// Measurement kind this instance reports.
    pub kind: String,

    /// Driver-specific address string.
    pub address: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// GPIO line for power management, if the probe needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_pin: Option<u8>,
}

impl SensorSpec {
    /// Create a spec with the required fields.
    pub fn new(
        hardware: impl Into<String>,
        kind: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            hardware: hardware.into(),
            kind: kind.into(),
            address: address.into(),
            name: String::new(),
            power_pin: None,
        }
    }

    /// Set the persisted id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the power-management GPIO line.
    #[must_use]
    pub fn with_power_pin(mut self, pin: u8) -> Self {
        self.power_pin = Some(pin);
        self
    }
}

/// Configuration for one relay instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySpec {
    /// Stable identifier; omitted on first creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Hardware-type identifier (registry dispatch key).
    pub hardware: String,

    /// Driver-specific address string.
    pub address: String,

    /// Display name.
    #[serde(default)]
    pub name: String,
}

impl RelaySpec {
    /// Create a spec with the required fields.
    pub fn new(hardware: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: None,
            hardware: hardware.into(),
            address: address.into(),
            name: String::new(),
        }
    }

    /// Set the persisted id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// The full hardware configuration of a deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Configured sensors.
    #[serde(default)]
    pub sensors: Vec<SensorSpec>,

    /// Configured relays.
    #[serde(default)]
    pub relays: Vec<RelaySpec>,
}

impl HardwareConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] when the TOML does not match the
    /// schema.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::invalid_value(format!("Invalid hardware config: {e}")))
    }

    /// Load a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read and
    /// [`Error::InvalidValue`] when it does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

/// Build every configured device, skipping the ones that fail.
///
/// Startup keeps going when a single device is misconfigured or unplugged:
/// the failure is logged with the device context and the rest of the fleet
/// comes up.
pub async fn build_all(
    config: &HardwareConfig,
    sensors: &SensorFactory,
    relays: &RelayFactory,
) -> (Vec<Sensor>, Vec<Relay>) {
    let mut built_sensors = Vec::with_capacity(config.sensors.len());
    for spec in &config.sensors {
        match sensors.build(spec).await {
            Ok(sensor) => built_sensors.push(sensor),
            Err(e) => warn!(
                "Failed to load sensor '{}' at address '{}': {e} (continuing with other devices)",
                spec.name, spec.address
            ),
        }
    }

    let mut built_relays = Vec::with_capacity(config.relays.len());
    for spec in &config.relays {
        match relays.build(spec).await {
            Ok(relay) => built_relays.push(relay),
            Err(e) => warn!(
                "Failed to load relay '{}' at address '{}': {e} (continuing with other devices)",
                spec.name, spec.address
            ),
        }
    }

    (built_sensors, built_relays)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_round_trip_preserves_addresses_verbatim() {
        let config = HardwareConfig {
            sensors: vec![
                SensorSpec::new("sht2x", "temperature", "0x40,1").with_name("Terrarium top"),
            ],
            relays: vec![RelaySpec::new("pca9685-dimmer", "3").with_name("Basking lamp")],
        };

        let toml = toml::to_string(&config).unwrap();
        let back = HardwareConfig::from_toml(&toml).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.sensors[0].address, "0x40,1");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let config = HardwareConfig::from_toml("").unwrap();
        assert!(config.sensors.is_empty());
        assert!(config.relays.is_empty());
    }

    #[test]
    fn schema_violations_are_reported() {
        let result = HardwareConfig::from_toml("[[sensors]]\nname = \"no hardware field\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn example_toml_from_module_docs_parses() {
        let config = HardwareConfig::from_toml(
            r#"
            [[sensors]]
            hardware = "sht2x"
            kind = "temperature"
            address = "0x40"
            name = "Terrarium top"

            [[sensors]]
            hardware = "analog"
            kind = "moisture"
            address = "0,1"
            name = "Soil bed"
            power_pin = 17

            [[relays]]
            hardware = "pca9685-dimmer"
            address = "3"
            name = "Basking lamp"
            "#,
        )
        .unwrap();

        assert_eq!(config.sensors.len(), 2);
        assert_eq!(config.sensors[1].power_pin, Some(17));
        assert_eq!(config.relays.len(), 1);
    }
}
