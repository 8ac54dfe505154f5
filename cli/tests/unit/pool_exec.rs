//! Bridge pool command execution against a scripted device listing.

use std::time::Duration;

use emufleet::application::pool::{BridgeConnectionPool, DeviceAddress, ExecOptions, PoolSettings};
use emufleet::domain::error::FleetError;

use crate::helpers::ScriptedBridge;

fn pool(bridge: &ScriptedBridge) -> BridgeConnectionPool<ScriptedBridge> {
    BridgeConnectionPool::new(bridge.clone(), PoolSettings::default())
}

#[tokio::test]
async fn port_targets_prefer_the_canonical_serial_and_cache_it() {
    let bridge = ScriptedBridge::with_devices(&[
        ("emulator-5556", "device"),
        ("127.0.0.1:5557", "device"),
    ]);
    let pool = pool(&bridge);

    let first = pool
        .execute(&DeviceAddress::Port(5557), "getprop ro.serialno", ExecOptions::default())
        .await
        .expect("first");
    let second = pool
        .execute(&DeviceAddress::Port(5557), "echo ok", ExecOptions::default())
        .await
        .expect("second");

    assert_eq!(first.trim(), "127.0.0.1:5557:getprop ro.serialno");
    assert_eq!(second.trim(), "127.0.0.1:5557:echo ok");
    assert_eq!(bridge.calls.count("devices"), 1);
    let stats = pool.stats();
    assert_eq!(stats.commands, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
}

#[tokio::test]
async fn serial_targets_skip_resolution() {
    let bridge = ScriptedBridge::default();
    let pool = pool(&bridge);

    let out = pool
        .execute(&"emulator-5554".parse().expect("address"), "id", ExecOptions::default())
        .await
        .expect("execute");

    assert_eq!(out.trim(), "emulator-5554:id");
    assert_eq!(bridge.calls.count("devices"), 0);
}

#[tokio::test]
async fn offline_devices_are_never_addressed() {
    let bridge = ScriptedBridge::with_devices(&[("127.0.0.1:5557", "offline")]);
    let pool = pool(&bridge);

    let err = pool
        .execute(&DeviceAddress::Port(5557), "echo ok", ExecOptions::default())
        .await
        .expect_err("no ready device");

    assert!(
        matches!(FleetError::find(&err), Some(FleetError::DeviceNotFound(_))),
        "{err:#}"
    );
    assert_eq!(bridge.calls.count("shell"), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_commands_fail_with_a_timeout() {
    let bridge = ScriptedBridge {
        shell_delay: Some(Duration::from_secs(60)),
        ..ScriptedBridge::default()
    };
    let pool = pool(&bridge);
    let options = ExecOptions {
        timeout: Some(Duration::from_secs(2)),
        skip_cache: false,
    };

    let err = pool
        .execute(&DeviceAddress::Serial("emulator-5554".into()), "sleep 60", options)
        .await
        .expect_err("timeout");

    let Some(FleetError::CommandTimeout { timeout, .. }) = FleetError::find(&err) else {
        panic!("expected CommandTimeout, got {err:#}");
    };
    assert_eq!(*timeout, Duration::from_secs(2));
    assert_eq!(pool.stats().timeouts, 1);
}

#[tokio::test]
async fn batches_resolve_once_and_keep_order() {
    let bridge = ScriptedBridge::with_devices(&[("127.0.0.1:5559", "device")]);
    let pool = pool(&bridge);

    let outputs = pool
        .execute_batch(
            &DeviceAddress::Port(5559),
            &["pm list packages", "dumpsys battery"],
            ExecOptions::default(),
        )
        .await
        .expect("batch");

    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].contains("pm list packages"));
    assert!(outputs[1].contains("dumpsys battery"));
    assert_eq!(bridge.calls.count("devices"), 1);
}
