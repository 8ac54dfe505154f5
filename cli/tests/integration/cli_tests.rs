//! Help, version and argument-parsing behaviour.

use assert_cmd::Command;
use predicates::prelude::*;

fn emufleet() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("emufleet"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    emufleet().assert().code(2).stderr(predicate::str::contains(
        "Control plane for fleets of emulated Android instances",
    ));
}

#[test]
fn test_launch_all_help_describes_all_as_inclusive() {
    emufleet()
        .args(["launch-all", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no-op if attached"))
        .stdout(predicate::str::contains("Relaunch").not());
}

#[test]
fn test_cli_help_lists_fleet_commands() {
    emufleet()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("launch-all"))
        .stdout(predicate::str::contains("stop-all"))
        .stdout(predicate::str::contains("clone"));
}

#[test]
fn test_version_command_shows_version() {
    emufleet()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "emufleet {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let output = emufleet()
        .args(["version", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_unknown_subcommand_fails() {
    emufleet()
        .arg("teleport")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_exec_requires_a_command() {
    emufleet()
        .args(["exec", "Worker_0"])
        .assert()
        .code(2);
}
