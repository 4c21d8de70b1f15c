//! Hardware abstraction and device-loading framework for the Vivarium
//! environment controller.
//!
//! This crate is the device engine every hardware category in the
//! controller runs on: sensors and relays are declared as
//! `(hardware type, address)` specs, constructed through string-keyed
//! factories, and polled through a shared caching pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ registry            explicit driver lists, discovery        │
//! ├─────────────────────────────────────────────────────────────┤
//! │ factory             spec -> validated -> driver variant     │
//! ├─────────────────────────────────────────────────────────────┤
//! │ sensor / relay      lifecycle: handle cache + retry,        │
//! │                     power sequencing, update pipeline       │
//! ├─────────────────────────────────────────────────────────────┤
//! │ drivers             AnySensorDriver / AnyRelayDriver        │
//! │                     (analog, sht2x, script, pca9685, mock)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ bus                 Platform seam: AnalogSource, I2cBus,    │
//! │                     PwmChip, PowerPin (embedder-supplied)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The shared result cache (`vivarium-cache`) sits beside this stack:
//! hardware handles are memoized per physical address and measurement
//! bundles are reused across the logical sensors of one chip, with a
//! single-flight gate keeping concurrent pollers down to one physical read.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use vivarium_hardware::config::SensorSpec;
//! use vivarium_hardware::factory::SensorFactory;
//! use vivarium_hardware::mock::MockPlatform;
//!
//! # #[tokio::main]
//! # async fn main() -> vivarium_core::Result<()> {
//! let factory = SensorFactory::new(Arc::new(MockPlatform::new()));
//!
//! let mut sensor = factory
//!     .build(&SensorSpec::new("mock", "temperature", "21.5").with_name("Demo"))
//!     .await?;
//!
//! // Construction loads hardware but never measures; polling does.
//! assert_eq!(sensor.value(), None);
//!
//! let value = sensor.update(false).await?;
//! assert_eq!(value, Some(21.5));
//! # Ok(())
//! # }
//! ```
//!
//! # Real hardware
//!
//! Concrete wiring is not compiled into this crate. A deployment
//! implements the [`bus::Platform`] trait over its GPIO/I2C/SPI stack and
//! hands it to the factories; everything above the seam (address grammars,
//! retry policy, caching, polling) stays identical between mock and real
//! platforms.

pub mod address;
pub mod bus;
pub mod caches;
pub mod config;
pub mod drivers;
pub mod factory;
pub mod mock;
pub mod poller;
pub mod registry;
pub mod relay;
mod retry;
pub mod sensor;
pub mod traits;
pub mod validator;

// Re-export commonly used types for convenience
pub use address::Address;
pub use config::{HardwareConfig, RelaySpec, SensorSpec, build_all};
pub use drivers::{AnyRelayDriver, AnySensorDriver, RelayHandle, SensorHandle};
pub use factory::{RelayFactory, SensorFactory};
pub use poller::{Poller, PollerConfig, PollerEvent, PollerHandle};
pub use registry::{HardwareInfo, RelayInfo, available_devices, available_kinds, available_relays};
pub use relay::Relay;
pub use sensor::Sensor;
pub use traits::{HardwareDescriptor, RelayDescriptor, RelayDriver, SensorDriver};
pub use validator::{LimitValidator, ReadingValidator, Verdict};
