//! End-to-end tests of the sensor construction and update pipeline.
//!
//! Every test runs over an isolated platform and isolated caches so the
//! process-wide shared instances never couple tests together.

use std::sync::Arc;
use vivarium_cache::{CacheKey, TtlCache};
use vivarium_core::{Error, MeasurementBundle, MeasurementKind};
use vivarium_hardware::bus::PowerPin;
use vivarium_hardware::config::SensorSpec;
use vivarium_hardware::drivers::MockSensorState;
use vivarium_hardware::factory::SensorFactory;
use vivarium_hardware::mock::{EventLog, MockAnalogSource, MockPlatform};
use vivarium_hardware::{LimitValidator, Sensor, SensorHandle};

struct Rig {
    factory: SensorFactory,
    platform: Arc<MockPlatform>,
    handles: TtlCache<SensorHandle>,
    readings: TtlCache<MeasurementBundle>,
}

fn rig() -> Rig {
    rig_with(MockPlatform::new())
}

fn rig_with(platform: MockPlatform) -> Rig {
    let platform = Arc::new(platform);
    let handles = TtlCache::new();
    let readings = TtlCache::new();
    let factory =
        SensorFactory::with_caches(platform.clone(), handles.clone(), readings.clone());

    Rig {
        factory,
        platform,
        handles,
        readings,
    }
}

fn mock_state(sensor: &Sensor) -> Arc<MockSensorState> {
    match sensor.handle() {
        Some(SensorHandle::Mock(state)) => Arc::clone(state),
        other => panic!("expected a mock handle, got {other:?}"),
    }
}

fn reading_key(sensor: &Sensor) -> CacheKey {
    CacheKey::derive(&[sensor.hardware(), sensor.address().as_str()])
}

#[tokio::test]
async fn derived_id_is_a_pure_function_of_the_triple() {
    let spec = SensorSpec::new("mock", "temperature", "21.5");

    let first = rig().factory.build(&spec).await.unwrap();
    let second = rig().factory.build(&spec).await.unwrap();
    assert_eq!(first.id(), second.id());

    let humidity = rig()
        .factory
        .build(&SensorSpec::new("mock", "humidity", "21.5"))
        .await
        .unwrap();
    assert_ne!(first.id(), humidity.id());

    let explicit = rig()
        .factory
        .build(&spec.clone().with_id("legacy-7"))
        .await
        .unwrap();
    assert_eq!(explicit.id().as_str(), "legacy-7");
}

#[tokio::test]
async fn unknown_hardware_fails_without_side_effects() {
    let rig = rig();
    let spec = SensorSpec::new("dht11", "temperature", "4");

    let result = rig.factory.build(&spec).await;
    assert!(matches!(result, Err(Error::UnknownHardware { .. })));

    assert!(rig.handles.is_empty());
    assert!(rig.readings.is_empty());
}

#[tokio::test]
async fn construction_loads_hardware_but_never_measures() {
    let rig = rig();
    let sensor = rig
        .factory
        .build(&SensorSpec::new("mock", "temperature", "21.5"))
        .await
        .unwrap();

    assert!(sensor.handle().is_some());
    assert_eq!(rig.handles.len(), 1);
    assert_eq!(mock_state(&sensor).reads(), 0);
    assert_eq!(sensor.value(), None);
    assert_eq!(sensor.last_update(), None);
}

#[tokio::test]
async fn logical_sensors_share_one_physical_read() {
    let rig = rig();
    let mut temperature = rig
        .factory
        .build(&SensorSpec::new("mock", "temperature", "21.5"))
        .await
        .unwrap();
    let mut humidity = rig
        .factory
        .build(&SensorSpec::new("mock", "humidity", "21.5"))
        .await
        .unwrap();

    // One cached handle serves both instances.
    assert!(Arc::ptr_eq(
        &mock_state(&temperature),
        &mock_state(&humidity)
    ));
    assert_eq!(rig.handles.len(), 1);

    assert_eq!(temperature.update(false).await.unwrap(), Some(21.5));
    assert_eq!(mock_state(&temperature).reads(), 1);

    // The second instance is served from the cached bundle.
    assert_eq!(humidity.update(false).await.unwrap(), Some(21.5));
    assert_eq!(mock_state(&humidity).reads(), 1);
}

#[tokio::test]
async fn forced_update_measures_again() {
    let rig = rig();
    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("mock", "temperature", "21.5"))
        .await
        .unwrap();

    sensor.update(false).await.unwrap();
    sensor.update(true).await.unwrap();
    assert_eq!(mock_state(&sensor).reads(), 2);
}

#[tokio::test]
async fn running_flag_suppresses_a_second_physical_measurement() {
    // The running gate is an atomic test-and-set, not a split check/set
    // pair, so two pollers can never both start measuring. With the flag
    // held by someone else, even a forced update must not touch the
    // hardware.
    let rig = rig();
    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("mock", "temperature", "21.5"))
        .await
        .unwrap();

    assert_eq!(sensor.update(false).await.unwrap(), Some(21.5));
    assert_eq!(mock_state(&sensor).reads(), 1);

    let key = reading_key(&sensor);
    assert!(rig.readings.set_running(&key));

    // Forced update while another poller holds the gate: no physical read,
    // the cached bundle is served instead.
    assert_eq!(sensor.update(true).await.unwrap(), Some(21.5));
    assert_eq!(mock_state(&sensor).reads(), 1);

    rig.readings.clear_running(&key);
}

#[tokio::test(start_paused = true)]
async fn failing_reads_are_attempted_exactly_three_times() {
    let rig = rig();
    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("mock", "temperature", "33.3,1000000"))
        .await
        .unwrap();

    let value = sensor.update(false).await.unwrap();
    assert_eq!(value, None);
    assert_eq!(mock_state(&sensor).reads(), 3);
    assert_eq!(sensor.value(), None);
}

#[tokio::test(start_paused = true)]
async fn last_value_survives_transient_outages() {
    let rig = rig();
    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("mock", "temperature", "21.5"))
        .await
        .unwrap();

    assert_eq!(sensor.update(false).await.unwrap(), Some(21.5));
    let stamped = sensor.last_update();

    // Hardware goes dark; the cached bundle is dropped so the next poll
    // really measures.
    mock_state(&sensor).fail_next(u32::MAX);
    rig.readings.clear(&reading_key(&sensor));

    assert_eq!(sensor.update(false).await.unwrap(), None);
    assert_eq!(sensor.value(), Some(21.5));
    assert_eq!(sensor.last_update(), stamped);
}

#[tokio::test(start_paused = true)]
async fn power_is_sequenced_around_the_measurement() {
    let log = EventLog::new();
    let rig = rig_with(MockPlatform::with_log(log.clone()));

    let bus = rig.platform.i2c_bus(1);
    bus.queue_response(0xF3, &[0x64, 0x00]);
    bus.queue_response(0xF5, &[0x80, 0x00]);

    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("sht2x", "temperature", "0x40").with_power_pin(17))
        .await
        .unwrap();

    let expected = ((100.0 * 256.0) * 175.72 / 65536.0) - 46.85;
    let value = sensor.update(false).await.unwrap().unwrap();
    assert!((value - expected).abs() < 0.01);

    let events = log.events();
    assert_eq!(events.first().map(String::as_str), Some("power on"));
    assert_eq!(events.last().map(String::as_str), Some("power off"));
    assert!(events.iter().any(|event| event.starts_with("i2c write")));

    let pin = rig.platform.power_pin(17);
    assert_eq!(pin.transitions(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn power_is_released_even_when_the_measurement_fails() {
    let log = EventLog::new();
    let rig = rig_with(MockPlatform::with_log(log.clone()));
    // No queued I2C responses: every conversion fails.

    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("sht2x", "temperature", "0x41").with_power_pin(5))
        .await
        .unwrap();

    assert_eq!(sensor.update(false).await.unwrap(), None);

    let events = log.events();
    let ons = events.iter().filter(|e| *e == "power on").count();
    let offs = events.iter().filter(|e| *e == "power off").count();

    // One power cycle per retry attempt, release guaranteed on the failure
    // path too.
    assert_eq!(ons, 3);
    assert_eq!(offs, 3);
    assert_eq!(events.last().map(String::as_str), Some("power off"));
    assert!(!rig.platform.power_pin(5).is_active());
}

#[tokio::test(start_paused = true)]
async fn analog_reading_is_the_trimmed_mean() {
    let rig = rig();
    rig.platform
        .set_analog_source(0, 0, MockAnalogSource::with_sequence(&[1.0, 2.0, 3.0, 4.0, 5.0]));

    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("analog", "moisture", "0"))
        .await
        .unwrap();

    assert_eq!(sensor.update(false).await.unwrap(), Some(3.0));
}

#[tokio::test(start_paused = true)]
async fn bare_hex_i2c_address_reaches_the_right_chip() {
    let rig = rig();

    // Responses are queued for chip 0x40; the sensor is configured with the
    // bare segment "40", which must normalize to the same chip.
    let bus = rig.platform.i2c_bus(1);
    bus.queue_response(0xF3, &[0x64, 0x00]);
    bus.queue_response(0xF5, &[0x80, 0x00]);

    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("sht2x", "humidity", "40"))
        .await
        .unwrap();
    assert_eq!(sensor.address().as_str(), "40");

    let expected = ((128.0 * 256.0) * 125.0 / 65536.0) - 6.0;
    let value = sensor.update(false).await.unwrap().unwrap();
    assert!((value - expected).abs() < 0.01);
}

#[tokio::test]
async fn erratic_readings_are_suppressed_then_promoted() {
    let rig = rig();
    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("mock", "temperature", "50.0"))
        .await
        .unwrap();
    sensor.set_validator(Box::new(LimitValidator::new(0.0, 40.0).unwrap()));

    // Four consecutive out-of-limit readings are counted, not stored.
    for expected_count in 1..=4 {
        assert_eq!(sensor.update(true).await.unwrap(), None);
        assert_eq!(sensor.erratic(), expected_count);
        assert_eq!(sensor.value(), None);
    }

    // The fifth consecutive erratic reading becomes the accepted value.
    assert_eq!(sensor.update(true).await.unwrap(), Some(50.0));
    assert_eq!(sensor.erratic(), 0);
    assert_eq!(sensor.value(), Some(50.0));
}

#[tokio::test]
async fn accepted_reading_resets_the_erratic_counter() {
    let rig = rig();
    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("mock", "temperature", "50.0"))
        .await
        .unwrap();
    sensor.set_validator(Box::new(LimitValidator::new(0.0, 40.0).unwrap()));

    sensor.update(true).await.unwrap();
    sensor.update(true).await.unwrap();
    assert_eq!(sensor.erratic(), 2);

    // The probe recovers into range; the streak is broken.
    mock_state(&sensor).set_value(30.0);
    assert_eq!(sensor.update(true).await.unwrap(), Some(30.0));
    assert_eq!(sensor.erratic(), 0);
    assert_eq!(sensor.value(), Some(30.0));
}

#[tokio::test]
async fn stop_releases_the_power_pin() {
    let rig = rig();
    let mut sensor = rig
        .factory
        .build(&SensorSpec::new("mock", "temperature", "21.5").with_power_pin(22))
        .await
        .unwrap();

    let pin = rig.platform.power_pin(22);
    pin.set_active(true).unwrap();

    sensor.stop();
    assert!(!pin.is_active());
}

#[tokio::test]
async fn discovery_listings_expose_the_registered_families() {
    let devices = vivarium_hardware::available_devices();
    assert!(devices.iter().any(|d| d.hardware == "sht2x"));

    let script = devices.iter().find(|d| d.hardware == "script").unwrap();
    let conductivity = MeasurementKind::new("conductivity").unwrap();
    assert!(script.kinds.contains(&conductivity));
}
