//! Registry reconciliation against scripted console enumerations.

use emufleet::application::lifecycle::{LifecycleController, LifecycleSettings};
use emufleet::application::pool::{BridgeConnectionPool, PoolSettings};
use emufleet::application::registry::InstanceRegistry;
use emufleet::domain::error::FleetError;
use emufleet::domain::instance::LifecyclePhase;
use emufleet::domain::port::PortResolver;

use crate::helpers::{ScriptedBridge, ScriptedConsole};

const FLEET: &str = "0,LDPlayer,0,0,0,-1,-1\n\
                     1,Worker_0,0,0,1,4242,4300\n\
                     2,Worker_1,0,0,0,-1,-1\n";

fn controller(
    console: &ScriptedConsole,
    bridge: &ScriptedBridge,
) -> LifecycleController<ScriptedConsole, ScriptedBridge> {
    LifecycleController::new(
        console.clone(),
        BridgeConnectionPool::new(bridge.clone(), PoolSettings::default()),
        InstanceRegistry::default(),
        LifecycleSettings::default(),
    )
}

#[tokio::test]
async fn refresh_registers_every_listed_instance_at_its_formula_port() {
    let console = ScriptedConsole::with_list2(FLEET);
    let registry = InstanceRegistry::new(PortResolver::new(5555));

    registry.refresh(&console).await.expect("refresh");

    let all = registry.all();
    let names: Vec<&str> = all.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["LDPlayer", "Worker_0", "Worker_1"]);
    let worker = registry.get("Worker_0").expect("Worker_0");
    assert_eq!(worker.port, 5557);
    assert_eq!(worker.phase, LifecyclePhase::Running);
    assert_eq!(worker.pid, Some(4242));
    assert_eq!(
        registry.get("Worker_1").expect("Worker_1").phase,
        LifecyclePhase::Stopped
    );
}

#[tokio::test]
async fn refresh_evicts_removed_names_and_follows_index_changes() {
    let console = ScriptedConsole::with_list2(FLEET);
    let registry = InstanceRegistry::new(PortResolver::new(5555));
    registry.refresh(&console).await.expect("first refresh");

    console.set_list2("0,LDPlayer,0,0,0,-1,-1\n4,Worker_1,0,0,0,-1,-1\n");
    registry.refresh(&console).await.expect("second refresh");

    assert!(registry.get("Worker_0").is_none());
    let moved = registry.get("Worker_1").expect("Worker_1");
    assert_eq!(moved.index, 4);
    assert_eq!(moved.port, 5563);
}

#[tokio::test]
async fn custom_base_port_shifts_every_formula_port() {
    let console = ScriptedConsole::with_list2(FLEET);
    let registry = InstanceRegistry::new(PortResolver::new(6000));
    registry.refresh(&console).await.expect("refresh");
    assert_eq!(registry.get("Worker_1").expect("Worker_1").port, 6004);
}

#[tokio::test]
async fn unknown_name_reports_the_known_ones() {
    let console = ScriptedConsole::with_list2(FLEET);
    let ctl = controller(&console, &ScriptedBridge::default());

    let err = ctl
        .get_adb_port_for_instance("Worker_7")
        .await
        .expect_err("unknown instance");

    let Some(FleetError::InstanceNotFound { name, known }) = FleetError::find(&err) else {
        panic!("expected InstanceNotFound, got {err:#}");
    };
    assert_eq!(name, "Worker_7");
    assert!(known.contains(&"Worker_0".to_string()), "{known:?}");
}

#[tokio::test]
async fn port_lookup_uses_the_live_formula_port() {
    let console = ScriptedConsole::with_list2(FLEET);
    let bridge = ScriptedBridge::with_devices(&[("127.0.0.1:5557", "device")]);
    let ctl = controller(&console, &bridge);

    let port = ctl.get_adb_port_for_instance("Worker_0").await.expect("port");

    assert_eq!(port, 5557);
    assert_eq!(bridge.calls.count("connect"), 0);
}

#[tokio::test]
async fn launch_of_an_attached_running_instance_issues_no_console_launch() {
    let console = ScriptedConsole::with_list2(FLEET);
    let bridge = ScriptedBridge::with_devices(&[("emulator-5556", "device")]);
    let ctl = controller(&console, &bridge);

    let inst = ctl
        .launch("Worker_0", &ctl.launch_options())
        .await
        .expect("launch");

    assert_eq!(inst.phase, LifecyclePhase::Running);
    assert_eq!(inst.port, 5557);
    assert_eq!(console.calls.count("launch "), 0);
}
