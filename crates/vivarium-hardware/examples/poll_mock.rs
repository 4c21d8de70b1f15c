//! Poll a small mock fleet and print its readings.
//!
//! Run with:
//!
//! ```sh
//! RUST_LOG=info cargo run -p vivarium-hardware --example poll_mock
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vivarium_hardware::config::HardwareConfig;
use vivarium_hardware::factory::{RelayFactory, SensorFactory};
use vivarium_hardware::mock::{MockAnalogSource, MockPlatform};
use vivarium_hardware::poller::{Poller, PollerConfig, PollerEvent};

const CONFIG: &str = r#"
[[sensors]]
hardware = "mock"
kind = "temperature"
address = "23.4"
name = "Terrarium top"

[[sensors]]
hardware = "mock"
kind = "humidity"
address = "23.4"
name = "Terrarium top RH"

[[sensors]]
hardware = "analog"
kind = "moisture"
address = "0"
name = "Soil bed"

[[relays]]
hardware = "pca9685-dimmer"
address = "3"
name = "Basking lamp"
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let platform = Arc::new(MockPlatform::new());
    platform.set_analog_source(0, 0, MockAnalogSource::with_sequence(&[0.42, 0.44, 0.43]));

    let config = HardwareConfig::from_toml(CONFIG)?;
    let sensors = SensorFactory::new(platform.clone());
    let relays = RelayFactory::new(platform);

    let (sensors, mut relays) = vivarium_hardware::build_all(&config, &sensors, &relays).await;
    println!("loaded {} sensors, {} relays", sensors.len(), relays.len());

    for relay in &mut relays {
        let state = relay.set_state(75.0).await?;
        println!("{relay}: {state}%");
    }

    let mut poller = Poller::new(PollerConfig {
        interval: Duration::from_secs(2),
        channel_capacity: 16,
    });
    for sensor in sensors {
        poller.register(sensor);
    }

    let mut handle = poller.start();
    let mut received = 0;
    while let Some(event) = handle.recv().await {
        match event {
            PollerEvent::Reading {
                id, kind, value, at,
            } => println!("{at} {kind} [{id}] = {value:.2}"),
            PollerEvent::NoReading { id } => println!("[{id}] no new value"),
            PollerEvent::UpdateFailed { device, error, .. } => {
                eprintln!("{device}: {error}");
            }
            _ => {}
        }

        received += 1;
        if received >= 9 {
            break;
        }
    }

    handle.shutdown().await;
    Ok(())
}
