//! Core types for the Vivarium environment controller.
//!
//! This crate defines the vocabulary shared by every hardware category in the
//! controller: measurement kinds, device identities, measurement bundles, the
//! closed error taxonomy, and the timing/retry constants that govern device
//! polling.
//!
//! Higher layers (the device cache, the hardware framework, the REST API)
//! depend on this crate; it depends on nothing but the serialization and
//! error-handling stack.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
