//! Background polling supervisor.
//!
//! The framework itself never schedules measurements; `update()` is driven
//! from outside. This module provides that driver for deployments that want
//! it in-process: one async task per registered sensor, each calling
//! `update()` on its interval and forwarding the outcome into a unified
//! event stream.
//!
//! ```text
//! ┌──────────┐       ┌─────────────────┐
//! │ Sensor   │──────►│                 │
//! │ Task     │       │  Event Channel  │
//! └──────────┘       │  (mpsc)         │
//!                    │                 │──────► API layer / history writer
//! ┌──────────┐       │                 │
//! │ Sensor   │──────►│                 │
//! │ Task     │       └─────────────────┘
//! └──────────┘
//! ```
//!
//! Devices are polled independently: a sensor stuck in its retry loop
//! delays nobody else. Because `update()` already de-duplicates in-flight
//! measurements per physical address, two logical sensors on one chip cost
//! one physical read per cycle.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use vivarium_hardware::config::SensorSpec;
//! use vivarium_hardware::factory::SensorFactory;
//! use vivarium_hardware::mock::MockPlatform;
//! use vivarium_hardware::poller::{Poller, PollerConfig, PollerEvent};
//!
//! #[tokio::main]
//! async fn main() -> vivarium_core::Result<()> {
//!     let factory = SensorFactory::new(Arc::new(MockPlatform::new()));
//!     let sensor = factory
//!         .build(&SensorSpec::new("mock", "temperature", "21.5"))
//!         .await?;
//!
//!     let mut poller = Poller::new(PollerConfig::default());
//!     poller.register(sensor);
//!
//!     let mut handle = poller.start();
//!     while let Some(event) = handle.recv().await {
//!         if let PollerEvent::Reading { value, .. } = event {
//!             println!("reading: {value}");
//!         }
//!     }
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::sensor::Sensor;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use vivarium_core::constants::MEASUREMENT_TTL;
use vivarium_core::{DeviceId, MeasurementKind};

/// One outcome of one poll cycle.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum PollerEvent {
    /// A new accepted value.
    Reading {
        /// Device identity.
        id: DeviceId,

        /// The measurement kind of the reading.
        kind: MeasurementKind,

        /// The accepted value.
        value: f64,

        /// Poll start time the value was stamped with.
        at: DateTime<Utc>,
    },

    /// The poll produced no new value (transient failure, suppressed
    /// erratic reading, or another poller's in-flight measurement).
    NoReading {
        /// Device identity.
        id: DeviceId,
    },

    /// `update()` returned an error (sequencing problem); the task keeps
    /// polling.
    UpdateFailed {
        /// Device identity.
        id: DeviceId,

        /// Device display identity for log/UI context.
        device: String,

        /// Error rendering.
        error: String,
    },
}

/// Configuration for the polling supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Pause between poll cycles per device.
    pub interval: Duration,

    /// Capacity of the unified event channel.
    pub channel_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            // Matches the measurement cache window, so every cycle can
            // produce a fresh value without forcing.
            interval: MEASUREMENT_TTL,
            channel_capacity: 100,
        }
    }
}

/// Polling supervisor: owns sensors until started.
pub struct Poller {
    sensors: Vec<Sensor>,
    config: PollerConfig,
    event_tx: mpsc::Sender<PollerEvent>,
    event_rx: Option<mpsc::Receiver<PollerEvent>>,
}

impl Poller {
    /// Create a supervisor with the given configuration.
    #[must_use]
    pub fn new(config: PollerConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);

        Self {
            sensors: Vec::new(),
            config,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Register a sensor to be polled. Must happen before [`start`](Self::start).
    pub fn register(&mut self, sensor: Sensor) {
        self.sensors.push(sensor);
    }

    /// Number of registered sensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// True if no sensors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Spawn one polling task per sensor and return the event handle.
    #[must_use]
    pub fn start(mut self) -> PollerHandle {
        let mut tasks = JoinSet::new();

        for sensor in self.sensors.drain(..) {
            let tx = self.event_tx.clone();
            let interval = self.config.interval;
            tasks.spawn(Self::sensor_task(sensor, interval, tx));
        }

        PollerHandle {
            event_rx: self.event_rx.take().expect("event receiver already taken"),
            tasks,
        }
    }

    async fn sensor_task(
        mut sensor: Sensor,
        interval: Duration,
        tx: mpsc::Sender<PollerEvent>,
    ) {
        loop {
            let event = match sensor.update(false).await {
                Ok(Some(value)) => PollerEvent::Reading {
                    id: sensor.id().clone(),
                    kind: sensor.kind().clone(),
                    value,
                    at: sensor.last_update().unwrap_or_else(Utc::now),
                },
                Ok(None) => PollerEvent::NoReading {
                    id: sensor.id().clone(),
                },
                Err(error) => PollerEvent::UpdateFailed {
                    id: sensor.id().clone(),
                    device: sensor.to_string(),
                    error: error.to_string(),
                },
            };

            // Backpressure: fall back to a blocking send when the channel
            // is full, and stop polling once the receiver is gone.
            match tx.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    debug!("Poller channel full; applying backpressure");
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }

            tokio::time::sleep(interval).await;
        }

        sensor.stop();
    }
}

/// Handle for receiving poll events and shutting the supervisor down.
pub struct PollerHandle {
    event_rx: mpsc::Receiver<PollerEvent>,
    tasks: JoinSet<()>,
}

impl PollerHandle {
    /// Receive the next event from any polling task.
    ///
    /// Returns `None` once every task has terminated.
    pub async fn recv(&mut self) -> Option<PollerEvent> {
        self.event_rx.recv().await
    }

    /// Abort all polling tasks and wait for them to wind down.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();

        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result
                && !e.is_cancelled()
            {
                warn!("Poller task ended abnormally: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorSpec;
    use crate::factory::SensorFactory;
    use crate::mock::MockPlatform;
    use std::sync::Arc;
    use vivarium_cache::TtlCache;

    fn isolated_factory() -> SensorFactory {
        SensorFactory::with_caches(
            Arc::new(MockPlatform::new()),
            TtlCache::new(),
            TtlCache::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn readings_flow_through_the_event_channel() {
        let factory = isolated_factory();
        let sensor = factory
            .build(&SensorSpec::new("mock", "temperature", "21.5"))
            .await
            .unwrap();
        let id = sensor.id().clone();

        let mut poller = Poller::new(PollerConfig {
            interval: Duration::from_millis(50),
            channel_capacity: 8,
        });
        poller.register(sensor);
        assert_eq!(poller.len(), 1);

        let mut handle = poller.start();

        match handle.recv().await {
            Some(PollerEvent::Reading { id: got, value, .. }) => {
                assert_eq!(got, id);
                assert_eq!(value, 21.5);
            }
            other => panic!("expected a reading, got {other:?}"),
        }

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failing_sensors_keep_their_task_alive() {
        let factory = isolated_factory();
        let sensor = factory
            .build(&SensorSpec::new("mock", "temperature", "21.5,1000000"))
            .await
            .unwrap();

        let mut poller = Poller::new(PollerConfig {
            interval: Duration::from_millis(50),
            channel_capacity: 8,
        });
        poller.register(sensor);

        let mut handle = poller.start();

        // Two consecutive cycles report "no reading" instead of dying.
        for _ in 0..2 {
            match handle.recv().await {
                Some(PollerEvent::NoReading { .. }) => {}
                other => panic!("expected no-reading, got {other:?}"),
            }
        }

        handle.shutdown().await;
    }
}
