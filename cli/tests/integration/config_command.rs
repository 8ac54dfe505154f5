//! `emufleet config` against a throwaway config file.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn emufleet(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("emufleet"));
    cmd.env("NO_COLOR", "1")
        .env("EMUFLEET_CONFIG", dir.path().join("config.yaml"));
    cmd
}

#[test]
fn test_config_path_honours_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    emufleet(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.yaml"));
}

#[test]
fn test_config_set_persists_and_show_reports_it() {
    let dir = tempfile::tempdir().unwrap();
    emufleet(&dir)
        .args(["config", "set", "batch.max_concurrent", "6"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set batch.max_concurrent = 6"));

    let output = emufleet(&dir)
        .args(["--json", "config", "show"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["config"]["batch"]["max_concurrent"], 6);
    assert_eq!(value["config"]["bridge"]["base_port"], 5555);
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    emufleet(&dir)
        .args(["config", "set", "security.level", "strict"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("security.level"));
    assert!(!dir.path().join("config.yaml").exists());
}

#[test]
fn test_config_set_rejects_zero_timeout() {
    let dir = tempfile::tempdir().unwrap();
    emufleet(&dir)
        .args(["config", "set", "timeouts.boot", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timeouts.boot"));
}
