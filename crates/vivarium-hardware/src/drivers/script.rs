//! Script sensor family.
//!
//! Runs a user-supplied executable and parses its stdout, letting
//! deployments integrate hardware the built-in families do not cover. The
//! address is the path of the executable; output is either a bare float
//! (reported as the instance's own measurement kind) or a JSON object of
//! `{"kind": value}` pairs.
//!
//! This is a *universal* family: it declares no measurement kinds of its
//! own and accepts any kind the registry knows about.

use crate::Address;
use crate::bus::Platform;
use crate::drivers::{SensorHandle, handle_mismatch};
use crate::traits::{HardwareDescriptor, SensorDriver};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Command;
use vivarium_core::{Error, MeasurementBundle, MeasurementKind, Result};

/// Hardware-type identifier for this family.
pub const HARDWARE: &str = "script";

/// Registry descriptor for this family. The empty kind list marks it
/// universal.
pub static DESCRIPTOR: HardwareDescriptor = HardwareDescriptor {
    hardware: HARDWARE,
    name: "Script (custom)",
    kinds: &[],
};

/// Script sensor driver.
#[derive(Debug, Clone)]
pub struct ScriptSensor {
    path: PathBuf,
    kind: MeasurementKind,
}

impl ScriptSensor {
    /// Use the address as the executable path.
    ///
    /// The instance's measurement kind is kept so bare-float output can be
    /// attributed to it.
    pub fn from_address(address: &Address, kind: &MeasurementKind) -> Self {
        Self {
            path: PathBuf::from(address.as_str()),
            kind: kind.clone(),
        }
    }

    /// The executable this sensor runs.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn parse_output(&self, stdout: &str) -> Result<MeasurementBundle> {
        let stdout = stdout.trim();

        if let Ok(value) = stdout.parse::<f64>() {
            let mut bundle = MeasurementBundle::new();
            bundle.insert(self.kind.clone(), value);
            return Ok(bundle);
        }

        match serde_json::from_str::<HashMap<String, f64>>(stdout) {
            Ok(values) => {
                let bundle = values
                    .into_iter()
                    .filter_map(|(kind, value)| {
                        MeasurementKind::new(&kind).ok().map(|kind| (kind, value))
                    })
                    .collect();
                Ok(bundle)
            }
            Err(error) => Err(Error::bus(format!(
                "unparseable script output '{stdout}': {error}"
            ))),
        }
    }
}

impl SensorDriver for ScriptSensor {
    fn descriptor(&self) -> &'static HardwareDescriptor {
        &DESCRIPTOR
    }

    async fn load_hardware(&self, _platform: &dyn Platform) -> Result<SensorHandle> {
        if !self.path.is_file() {
            return Err(Error::bus(format!(
                "script '{}' does not exist",
                self.path.display()
            )));
        }

        Ok(SensorHandle::Script(self.path.clone()))
    }

    async fn read(&self, handle: &SensorHandle) -> Result<MeasurementBundle> {
        let SensorHandle::Script(path) = handle else {
            return Err(handle_mismatch(HARDWARE));
        };

        let output = Command::new(path)
            .output()
            .await
            .map_err(|error| Error::bus(format!("failed to run '{}': {error}", path.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::bus(format!(
                "script '{}' exited with {}: {}",
                path.display(),
                output.status,
                stderr.trim()
            )));
        }

        self.parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_for(kind: &str) -> ScriptSensor {
        let address = Address::new("/usr/local/bin/read-probe").unwrap();
        ScriptSensor::from_address(&address, &MeasurementKind::new(kind).unwrap())
    }

    #[test]
    fn bare_float_output_is_attributed_to_own_kind() {
        let sensor = script_for("conductivity");
        let bundle = sensor.parse_output("1.87\n").unwrap();

        let conductivity = MeasurementKind::new("conductivity").unwrap();
        assert_eq!(bundle.get(&conductivity), Some(1.87));
    }

    #[test]
    fn json_output_produces_a_multi_kind_bundle() {
        let sensor = script_for("temperature");
        let bundle = sensor
            .parse_output(r#"{"temperature": 21.5, "humidity": 60.0}"#)
            .unwrap();

        assert_eq!(bundle.len(), 2);
        let humidity = MeasurementKind::new("humidity").unwrap();
        assert_eq!(bundle.get(&humidity), Some(60.0));
    }

    #[test]
    fn garbage_output_is_an_error() {
        let sensor = script_for("temperature");
        assert!(sensor.parse_output("sensor offline").is_err());
    }
}
