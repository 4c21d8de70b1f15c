//! Device address parsing.
//!
//! Every device is configured with a single address string: a comma-separated
//! list of positional parameters whose meaning is driver-specific. An analog
//! probe reads `channel[,device]`, an I2C chip reads `i2c_addr[,bus]`, a PWM
//! dimmer reads `channel[,i2c_addr[,bus]]`, and a script sensor's address is
//! simply the path of the executable to run.
//!
//! [`Address`] normalizes the raw string once (segments trimmed, empty
//! segments dropped) and the normalization is idempotent, so an address that
//! was persisted by the API layer parses back to the same value after a
//! process restart.
//!
//! # Examples
//!
//! ```
//! use vivarium_hardware::Address;
//!
//! let address = Address::new(" 0x40 , 1 ").unwrap();
//! assert_eq!(address.as_str(), "0x40,1");
//! assert_eq!(address.segment(0), Some("0x40"));
//! assert_eq!(address.segment(1), Some("1"));
//! assert_eq!(address.segment(2), None);
//!
//! // Bare hex I2C segments are normalized at parse time.
//! assert_eq!(address.i2c_segment(0).unwrap(), Some(0x40));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use vivarium_core::{Error, Result};

/// A parsed, normalized device address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    raw: String,
    segments: Vec<String>,
}

impl Address {
    /// Parse an address string.
    ///
    /// Segments are split on commas, trimmed, and empty segments dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if no segments remain after
    /// normalization.
    pub fn new(value: &str) -> Result<Self> {
        let segments: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() {
            return Err(Error::invalid_address(value, "address cannot be empty"));
        }

        let raw = segments.join(",");
        Ok(Address { raw, segments })
    }

    /// The normalized address string. Stable under re-parsing, so this is
    /// what the persistence layer stores.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All positional segments, in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The segment at `index`, if present.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// Parse the segment at `index` as an unsigned integer.
    ///
    /// Returns `Ok(None)` when the segment is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the segment is present but does
    /// not parse.
    pub fn numeric_segment(&self, index: usize) -> Result<Option<u8>> {
        match self.segment(index) {
            None => Ok(None),
            Some(segment) => segment.parse::<u8>().map(Some).map_err(|_| {
                Error::invalid_address(
                    &self.raw,
                    format!("segment {index} ('{segment}') is not a number"),
                )
            }),
        }
    }

    /// Parse the segment at `index` as an I2C address.
    ///
    /// Hex-looking segments lacking a `0x` prefix are normalized by
    /// prepending it, so `"40"` and `"0x40"` both resolve to `0x40`. The
    /// stored address string is never rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the segment is present but is not
    /// a valid hex number.
    pub fn i2c_segment(&self, index: usize) -> Result<Option<u16>> {
        match self.segment(index) {
            None => Ok(None),
            Some(segment) => {
                let digits = segment.strip_prefix("0x").unwrap_or(segment);
                u16::from_str_radix(digits, 16).map(Some).map_err(|_| {
                    Error::invalid_address(
                        &self.raw,
                        format!("segment {index} ('{segment}') is not an I2C address"),
                    )
                })
            }
        }
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True if the address has no segments (never the case for a
    /// successfully parsed address).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Address::new(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.raw
    }
}
