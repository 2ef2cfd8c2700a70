use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn rows(stdout: &[u8]) -> Vec<Value> {
    let value: Value = serde_json::from_slice(stdout).unwrap();
    value.as_array().unwrap().clone()
}

#[test]
fn test_simulate_builtin_json() {
    let dir = tempdir().unwrap();

    let output = cargo_bin_cmd!("windrow")
        .env("WINDROW_HOME", dir.path())
        .args(["simulate", "--json", "--items", "50"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows = rows(&output.stdout);
    let startup = &rows[2];
    assert_eq!(startup["step"], "wait idle");
    assert_eq!(startup["enabled"], true);
    assert_eq!(startup["dehydrated"], 42);
    assert_eq!(startup["at_bottom"], true);

    let last = rows.last().unwrap();
    assert_eq!(last["step"], "disable");
    assert_eq!(last["enabled"], false);
    assert_eq!(last["dehydrated"], 0);
}

#[test]
fn test_simulate_writes_log_file_under_home() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("windrow")
        .env("WINDROW_HOME", dir.path())
        .env("WINDROW_LOG", "windrow_core=debug")
        .args(["simulate", "--items", "20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dehydrated"))
        .stdout(predicate::str::contains("scroll_to_bottom"));

    let log = fs::read_to_string(dir.path().join("logs").join("windrow.log")).unwrap();
    assert!(log.contains("windowing enabled"));
}

#[test]
fn test_simulate_overrides_tail() {
    let dir = tempdir().unwrap();

    let output = cargo_bin_cmd!("windrow")
        .env("WINDROW_HOME", dir.path())
        .args(["simulate", "--json", "--tail", "20"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows = rows(&output.stdout);
    assert_eq!(rows[2]["dehydrated"], 30);
}

#[test]
fn test_simulate_scenario_file() {
    let dir = tempdir().unwrap();
    let scenario = dir.path().join("scenario.toml");
    fs::write(
        &scenario,
        r#"
[surface]
viewport = 600.0
item_height = 100.0

[[step]]
op = "load"
count = 50

[[step]]
op = "edit"
index = 0

[[step]]
op = "enable"

[[step]]
op = "wait"
"#,
    )
    .unwrap();

    let output = cargo_bin_cmd!("windrow")
        .env("WINDROW_HOME", dir.path())
        .arg("simulate")
        .arg("--json")
        .arg("--scenario")
        .arg(&scenario)
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows = rows(&output.stdout);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3]["dehydrated"], 41);
}

#[test]
fn test_simulate_rejects_bad_scenario() {
    let dir = tempdir().unwrap();
    let scenario = dir.path().join("scenario.toml");
    fs::write(&scenario, "[[step]]\nop = \"explode\"\n").unwrap();

    cargo_bin_cmd!("windrow")
        .env("WINDROW_HOME", dir.path())
        .arg("simulate")
        .arg("--scenario")
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse scenario"));
}

#[test]
fn test_simulate_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[options]\nbulk_load_threshold = 0\n",
    )
    .unwrap();

    cargo_bin_cmd!("windrow")
        .env("WINDROW_HOME", dir.path())
        .arg("simulate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("bulk_load_threshold"));
}
