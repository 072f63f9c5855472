//! Integration tests for the CLI skeleton: help, version and error output.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

pub fn hostprep() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hostprep"));
    cmd.env("NO_COLOR", "1").env_remove("HOSTPREP_CONFIG");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    // clap with arg_required_else_help shows help on stderr and exits 2
    hostprep()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Bootstrap a fresh host"));
}

#[test]
fn test_cli_help_lists_stage_commands() {
    hostprep()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("bootstrap"))
        .stdout(predicate::str::contains("toolchain"))
        .stdout(predicate::str::contains("cluster"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    hostprep()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hostprep"));
}

#[test]
fn test_version_command_prints_version() {
    hostprep()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "hostprep v{}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_json_is_valid_json() {
    let output = hostprep()
        .args(["version", "--json"])
        .output()
        .expect("run hostprep");
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_run_with_cluster_flag_parses() {
    hostprep()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--with-cluster"));
}

#[test]
fn test_unknown_command_fails() {
    hostprep()
        .arg("provision-everything")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_no_color_accepts_conventional_values() {
    for value in ["1", "0", "yes", ""] {
        hostprep()
            .env("NO_COLOR", value)
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains("hostprep v"));
    }
}

// --- Error output ---

#[test]
fn test_run_without_config_fails_before_connecting() {
    let dir = tempfile::tempdir().expect("tempdir");
    hostprep()
        .args(["run", "--yes", "--config"])
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("HOSTPREP_CONFIG"));
}

#[test]
fn test_json_error_has_code_and_message() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = hostprep()
        .args(["bootstrap", "--json", "--config"])
        .arg(dir.path().join("absent.yaml"))
        .output()
        .expect("run hostprep");
    assert_eq!(output.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(v["error"], true);
    assert_eq!(v["code"], "ERROR");
    assert!(
        v["message"]
            .as_str()
            .is_some_and(|m| m.contains("absent.yaml"))
    );
}
