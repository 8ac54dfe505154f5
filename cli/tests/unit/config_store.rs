//! Config persistence and `config set` semantics through the public API.

use emufleet::application::ports::ConfigStore;
use emufleet::domain::config::{FleetConfig, VALID_CONFIG_KEYS, apply_setting};
use emufleet::domain::error::ConfigError;
use emufleet::infra::YamlConfigStore;

#[test]
fn partial_file_keeps_defaults_for_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "bridge:\n  base_port: 6000\nbatch:\n  delay: 1\n").unwrap();

    let config = YamlConfigStore::with_path(&path).load().expect("load");

    assert_eq!(config.bridge.base_port, 6000);
    assert_eq!(config.bridge.host, "127.0.0.1");
    assert_eq!(config.batch.delay, 1);
    assert_eq!(config.batch.max_concurrent, 3);
    assert_eq!(config.tools.console, "ldconsole");
}

#[test]
fn every_whitelisted_key_round_trips_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = YamlConfigStore::with_path(dir.path().join("config.yaml"));
    let mut config = FleetConfig::default();
    for key in VALID_CONFIG_KEYS {
        let value = match *key {
            "tools.console" => "/opt/ld/ldconsole",
            "tools.bridge" => "/opt/ld/adb",
            "bridge.host" => "localhost",
            "bridge.base_port" => "5600",
            _ => "7",
        };
        apply_setting(&mut config, key, value).unwrap_or_else(|e| panic!("{key}: {e:#}"));
    }
    store.save(&config).expect("save");

    let loaded = store.load().expect("load");
    assert_eq!(loaded, config);
    assert_eq!(loaded.timeouts.boot, 7);
    assert_eq!(loaded.bridge.base_port, 5600);
}

#[test]
fn unknown_key_lists_the_valid_ones() {
    let mut config = FleetConfig::default();
    let err = apply_setting(&mut config, "security.level", "strict").unwrap_err();
    let Some(ConfigError::UnknownKey { valid, .. }) = err.downcast_ref::<ConfigError>() else {
        panic!("expected UnknownKey, got {err:#}");
    };
    assert!(valid.contains("timeouts.boot"));
}

#[test]
fn rejected_values_leave_the_config_untouched() {
    let mut config = FleetConfig::default();
    assert!(apply_setting(&mut config, "batch.max_concurrent", "0").is_err());
    assert!(apply_setting(&mut config, "timeouts.boot", "soon").is_err());
    assert_eq!(config, FleetConfig::default());
}
