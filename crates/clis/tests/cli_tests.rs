//! End-to-end tests of the `clis` binary that need no network access.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn clis(cwd: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("clis").unwrap();
    cmd.current_dir(cwd.path())
        .env_remove("CLIS_CONFIG")
        .env_remove("CLIS_BIN_DIR")
        .env_remove("CLIS_CONCURRENCY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_list_prints_catalogue() {
    let dir = TempDir::new().unwrap();
    clis(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("openshift-install"))
        .stdout(predicate::str::contains("kubectl (installed with oc)"))
        .stdout(predicate::str::contains("defaults: yq jq igc kubeseal oc"));
}

#[test]
fn test_list_as_json() {
    let dir = TempDir::new().unwrap();
    let output = clis(&dir).args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["provided"]["kubectl"], "oc");
    assert_eq!(value["default_versions"]["igc"], "1.50.2");
}

#[test]
fn test_list_uses_config_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("clis.toml"),
        "default_tools = [\"jq\"]\n",
    )
    .unwrap();

    clis(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("defaults: jq\n"));
}

#[test]
fn test_unknown_tool_fails_before_writing() {
    let dir = TempDir::new().unwrap();
    clis(&dir)
        .args(["check", "not-a-tool"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("not-a-tool"));

    assert!(!dir.path().join("bin").exists());
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("clis.toml"), "concurrency = 0\n").unwrap();

    clis(&dir)
        .arg("list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_environment_overrides_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("clis.toml"), "concurrency = 0\n").unwrap();
    let other = dir.path().join("other.toml");
    std::fs::write(&other, "concurrency = 1\n").unwrap();

    clis(&dir)
        .env("CLIS_CONFIG", &other)
        .arg("list")
        .assert()
        .success();
}
