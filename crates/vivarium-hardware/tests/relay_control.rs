//! End-to-end tests of relay construction and state control.

use std::sync::Arc;
use vivarium_cache::TtlCache;
use vivarium_core::Error;
use vivarium_core::constants::{RELAY_OFF, RELAY_ON};
use vivarium_hardware::config::RelaySpec;
use vivarium_hardware::factory::RelayFactory;
use vivarium_hardware::mock::MockPlatform;
use vivarium_hardware::{Relay, RelayHandle};

struct Rig {
    factory: RelayFactory,
    platform: Arc<MockPlatform>,
    handles: TtlCache<RelayHandle>,
}

fn rig() -> Rig {
    let platform = Arc::new(MockPlatform::new());
    let handles = TtlCache::new();
    let factory = RelayFactory::with_caches(platform.clone(), handles.clone());

    Rig {
        factory,
        platform,
        handles,
    }
}

fn pwm_chip_of(relay: &Relay) -> Arc<dyn vivarium_hardware::bus::PwmChip> {
    match relay.handle() {
        Some(RelayHandle::Pwm(target)) => Arc::clone(&target.chip),
        other => panic!("expected a pwm handle, got {other:?}"),
    }
}

#[tokio::test]
async fn dimmer_states_map_linearly_onto_duty() {
    let rig = rig();
    let mut relay = rig
        .factory
        .build(&RelaySpec::new("pca9685-dimmer", "3").with_name("Basking lamp"))
        .await
        .unwrap();

    assert!(relay.is_dimmer());
    assert_eq!(relay.set_state(50.0).await.unwrap(), 50.0);

    let chip = rig.platform.pwm_chip(0x40, 1);
    assert_eq!(chip.frequency(), Some(1000));

    use vivarium_hardware::bus::PwmChip;
    assert_eq!(chip.duty(3).unwrap(), 2048);

    assert_eq!(relay.state().await.unwrap(), 50.0);
    assert!(relay.is_on());
}

#[tokio::test]
async fn relays_on_one_chip_share_the_platform_handle() {
    let rig = rig();
    let mut first = rig
        .factory
        .build(&RelaySpec::new("pca9685-dimmer", "0"))
        .await
        .unwrap();
    let mut second = rig
        .factory
        .build(&RelaySpec::new("pca9685-dimmer", "1"))
        .await
        .unwrap();

    // Different channels mean different device addresses (and cache
    // entries), but the platform hands both the same chip.
    assert_eq!(rig.handles.len(), 2);
    assert!(Arc::ptr_eq(&pwm_chip_of(&first), &pwm_chip_of(&second)));

    first.set_state(100.0).await.unwrap();
    second.set_state(25.0).await.unwrap();

    use vivarium_hardware::bus::PwmChip;
    let chip = rig.platform.pwm_chip(0x40, 1);
    assert_eq!(chip.duty(0).unwrap(), 4095);
    assert_eq!(chip.duty(1).unwrap(), 1024);
}

#[tokio::test]
async fn same_address_reuses_the_cached_handle() {
    let rig = rig();
    let spec = RelaySpec::new("pca9685-dimmer", "3");

    let first = rig.factory.build(&spec).await.unwrap();
    let second = rig.factory.build(&spec).await.unwrap();

    assert_eq!(rig.handles.len(), 1);
    assert_eq!(first.id(), second.id());
}

#[tokio::test]
async fn unknown_relay_hardware_fails_without_side_effects() {
    let rig = rig();
    let result = rig.factory.build(&RelaySpec::new("sonoff", "1")).await;

    assert!(matches!(result, Err(Error::UnknownHardware { .. })));
    assert!(rig.handles.is_empty());
}

#[tokio::test]
async fn non_dimmer_relays_snap_to_on_or_off() {
    let rig = rig();
    let mut relay = rig
        .factory
        .build(&RelaySpec::new("mock", "1").with_name("Mister"))
        .await
        .unwrap();

    assert!(!relay.is_dimmer());
    assert_eq!(relay.set_state(42.0).await.unwrap(), RELAY_ON);
    assert!(relay.is_on());

    assert_eq!(relay.turn_off().await.unwrap(), RELAY_OFF);
    assert!(!relay.is_on());

    assert_eq!(relay.turn_on().await.unwrap(), RELAY_ON);
}

#[tokio::test]
async fn out_of_range_states_are_caller_errors() {
    let rig = rig();
    let mut relay = rig.factory.build(&RelaySpec::new("mock", "1")).await.unwrap();

    let result = relay.set_state(150.0).await;
    assert!(matches!(result, Err(Error::InvalidValue { .. })));
    assert_eq!(relay.value(), None);
}

#[tokio::test]
async fn relay_discovery_lists_both_families() {
    let relays = vivarium_hardware::available_relays();

    let dimmer = relays
        .iter()
        .find(|r| r.hardware == "pca9685-dimmer")
        .unwrap();
    assert!(dimmer.dimmer);

    let mock = relays.iter().find(|r| r.hardware == "mock").unwrap();
    assert!(!mock.dimmer);
}
