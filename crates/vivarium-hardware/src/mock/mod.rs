//! Mock buses and platform for development and testing.
//!
//! [`MockPlatform`] implements the [`Platform`](crate::bus::Platform) seam
//! entirely in memory: analog sources replay programmable voltage
//! sequences, the I2C bus answers conversions from queued response bytes,
//! the PWM chip records duties, and power pins record their transitions.
//! Every handle the platform opens is memoized, so tests can pre-program a
//! bus before building devices and inspect the very instances the drivers
//! used afterwards.
//!
//! An optional [`EventLog`] threads through every mock the platform
//! creates, producing a single ordered trace of bus and power activity,
//! which is how the power-sequencing guarantees are asserted.
//!
//! # Examples
//!
//! ```
//! use vivarium_hardware::mock::{EventLog, MockPlatform};
//!
//! let log = EventLog::new();
//! let platform = MockPlatform::with_log(log.clone());
//!
//! let bus = platform.i2c_bus(1);
//! bus.queue_response(0xF3, &[0x64, 0x00]);
//! ```

use crate::bus::{AnalogSource, I2cBus, Platform, PowerPin, PwmChip};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vivarium_core::{Error, Result};

/// Shared, ordered trace of mock hardware activity.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, event: impl Into<String>) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.into());
    }

    /// Snapshot of all events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Analog source replaying a programmed voltage sequence.
///
/// The sequence cycles; [`fail_after`](Self::fail_after) makes reads fail
/// once a total read count is reached.
#[derive(Debug)]
pub struct MockAnalogSource {
    values: Vec<f64>,
    cursor: AtomicUsize,
    fail_after: AtomicUsize,
}

impl MockAnalogSource {
    /// A source that always reads `value`.
    #[must_use]
    pub fn fixed(value: f64) -> Self {
        Self::with_sequence(&[value])
    }

    /// A source replaying `values` in order, cycling at the end.
    #[must_use]
    pub fn with_sequence(values: &[f64]) -> Self {
        Self {
            values: values.to_vec(),
            cursor: AtomicUsize::new(0),
            fail_after: AtomicUsize::new(usize::MAX),
        }
    }

    /// Fail every read from the `count`-th one on.
    pub fn fail_after(&self, count: usize) {
        self.fail_after.store(count, Ordering::SeqCst);
    }
}

impl Default for MockAnalogSource {
    fn default() -> Self {
        Self::fixed(0.5)
    }
}

impl AnalogSource for MockAnalogSource {
    fn read_voltage(&self) -> Result<f64> {
        let read = self.cursor.fetch_add(1, Ordering::SeqCst);
        if read >= self.fail_after.load(Ordering::SeqCst) {
            return Err(Error::bus("analog source failure injected"));
        }

        Ok(self.values[read % self.values.len()])
    }
}

#[derive(Debug, Default)]
struct MockI2cState {
    last_command: Option<u8>,
    responses: HashMap<u8, VecDeque<u8>>,
}

/// In-memory I2C bus answering conversions from queued bytes.
#[derive(Debug, Default)]
pub struct MockI2cBus {
    state: Mutex<MockI2cState>,
    log: Option<EventLog>,
}

impl MockI2cBus {
    /// Create a silent mock bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock bus recording into `log`.
    #[must_use]
    pub fn with_log(log: EventLog) -> Self {
        Self {
            state: Mutex::new(MockI2cState::default()),
            log: Some(log),
        }
    }

    /// Queue response bytes for a command byte.
    ///
    /// Reads following a write of `command` pop these bytes in order; an
    /// empty queue makes the read fail like an unresponsive chip.
    pub fn queue_response(&self, command: u8, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .responses
            .entry(command)
            .or_default()
            .extend(bytes.iter().copied());
    }
}

impl I2cBus for MockI2cBus {
    fn write_byte(&self, address: u16, value: u8) -> Result<()> {
        if let Some(log) = &self.log {
            log.record(format!("i2c write {address:#04x} {value:#04x}"));
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.last_command = Some(value);
        Ok(())
    }

    fn read_byte(&self, address: u16) -> Result<u8> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let command = state
            .last_command
            .ok_or_else(|| Error::bus("i2c read before any command"))?;

        let byte = state
            .responses
            .get_mut(&command)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                Error::bus(format!(
                    "no queued response for command {command:#04x} at {address:#04x}"
                ))
            })?;

        if let Some(log) = &self.log {
            log.record(format!("i2c read {address:#04x} -> {byte:#04x}"));
        }

        Ok(byte)
    }
}

/// In-memory PWM chip recording duties per channel.
#[derive(Debug, Default)]
pub struct MockPwmChip {
    duties: Mutex<HashMap<u8, u16>>,
    frequency: Mutex<Option<u32>>,
}

impl MockPwmChip {
    /// Create a mock chip.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last programmed frequency, if any.
    #[must_use]
    pub fn frequency(&self) -> Option<u32> {
        *self.frequency.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PwmChip for MockPwmChip {
    fn set_frequency(&self, hz: u32) -> Result<()> {
        *self.frequency.lock().unwrap_or_else(|e| e.into_inner()) = Some(hz);
        Ok(())
    }

    fn set_duty(&self, channel: u8, duty: u16) -> Result<()> {
        self.duties
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel, duty);
        Ok(())
    }

    fn duty(&self, channel: u8) -> Result<u16> {
        Ok(self
            .duties
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&channel)
            .copied()
            .unwrap_or(0))
    }
}

/// GPIO power line recording every transition.
#[derive(Debug, Default)]
pub struct MockPowerPin {
    active: AtomicBool,
    transitions: Mutex<Vec<bool>>,
    log: Option<EventLog>,
}

impl MockPowerPin {
    /// Create a silent mock pin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock pin recording into `log`.
    #[must_use]
    pub fn with_log(log: EventLog) -> Self {
        Self {
            active: AtomicBool::new(false),
            transitions: Mutex::new(Vec::new()),
            log: Some(log),
        }
    }

    /// Every state the pin was driven to, in order.
    #[must_use]
    pub fn transitions(&self) -> Vec<bool> {
        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl PowerPin for MockPowerPin {
    fn set_active(&self, active: bool) -> Result<()> {
        self.active.store(active, Ordering::SeqCst);
        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(active);

        if let Some(log) = &self.log {
            log.record(if active { "power on" } else { "power off" });
        }

        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Fully in-memory [`Platform`] implementation.
///
/// Opened handles are memoized per address, matching the sharing semantics
/// real platforms must provide (one bus object per physical bus).
#[derive(Debug, Default)]
pub struct MockPlatform {
    log: Option<EventLog>,
    analog: Mutex<HashMap<(u8, u8), Arc<MockAnalogSource>>>,
    i2c: Mutex<HashMap<u8, Arc<MockI2cBus>>>,
    pwm: Mutex<HashMap<(u16, u8), Arc<MockPwmChip>>>,
    power: Mutex<HashMap<u8, Arc<MockPowerPin>>>,
}

impl MockPlatform {
    /// Create a silent mock platform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock platform whose buses and pins record into `log`.
    #[must_use]
    pub fn with_log(log: EventLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    /// Install a programmed analog source for `(channel, device)`.
    pub fn set_analog_source(&self, channel: u8, device: u8, source: MockAnalogSource) {
        self.analog
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((channel, device), Arc::new(source));
    }

    /// The (memoized) I2C bus mock for `bus`, creating it if needed.
    ///
    /// Lets tests queue responses before any device is built.
    #[must_use]
    pub fn i2c_bus(&self, bus: u8) -> Arc<MockI2cBus> {
        let mut buses = self.i2c.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(buses.entry(bus).or_insert_with(|| match &self.log {
            Some(log) => Arc::new(MockI2cBus::with_log(log.clone())),
            None => Arc::new(MockI2cBus::new()),
        }))
    }

    /// The (memoized) PWM chip mock at `(address, bus)`, creating it if
    /// needed.
    #[must_use]
    pub fn pwm_chip(&self, address: u16, bus: u8) -> Arc<MockPwmChip> {
        let mut chips = self.pwm.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            chips
                .entry((address, bus))
                .or_insert_with(|| Arc::new(MockPwmChip::new())),
        )
    }

    /// The (memoized) power pin mock for `pin`, creating it if needed.
    #[must_use]
    pub fn power_pin(&self, pin: u8) -> Arc<MockPowerPin> {
        let mut pins = self.power.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(pins.entry(pin).or_insert_with(|| match &self.log {
            Some(log) => Arc::new(MockPowerPin::with_log(log.clone())),
            None => Arc::new(MockPowerPin::new()),
        }))
    }
}

impl Platform for MockPlatform {
    fn open_analog(&self, channel: u8, device: u8) -> Result<Arc<dyn AnalogSource>> {
        let mut sources = self.analog.lock().unwrap_or_else(|e| e.into_inner());
        let source = Arc::clone(
            sources
                .entry((channel, device))
                .or_insert_with(|| Arc::new(MockAnalogSource::default())),
        );
        Ok(source)
    }

    fn open_i2c(&self, bus: u8) -> Result<Arc<dyn I2cBus>> {
        Ok(self.i2c_bus(bus))
    }

    fn open_pwm(&self, address: u16, bus: u8) -> Result<Arc<dyn PwmChip>> {
        Ok(self.pwm_chip(address, bus))
    }

    fn open_power_pin(&self, pin: u8) -> Result<Arc<dyn PowerPin>> {
        Ok(self.power_pin(pin))
    }
}
