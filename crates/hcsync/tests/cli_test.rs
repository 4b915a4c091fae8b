#![allow(deprecated)] // TODO: switch Command::cargo_bin to cargo_bin_cmd!

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ACCOUNT: &str = "acc-1";
const REGION: &str = "ap-guangzhou";

fn vpc(cloud_id: &str, name: &str) -> Value {
    json!({ "cloud_id": cloud_id, "name": name, "region": REGION })
}

fn write_cloud(dir: &Path, vpcs: Vec<Value>) {
    let inventory = json!({
        "vendor": "tcloud",
        "account_id": ACCOUNT,
        "resources": { REGION: { "vpcs": vpcs } }
    });
    fs::write(dir.join("cloud.json"), inventory.to_string()).unwrap();
}

/// Command rooted in `dir` with an empty config file so defaults apply
fn hcsync(dir: &Path) -> Command {
    let config = dir.join("hcsync.yaml");
    if !config.exists() {
        fs::write(&config, "").unwrap();
    }
    let mut cmd = Command::cargo_bin("hcsync").unwrap();
    cmd.current_dir(dir)
        .env("HCSYNC_CONFIG_PATH", &config)
        .env_remove("HCSYNC_CLOUD")
        .env_remove("HCSYNC_ACCOUNT")
        .env_remove("HCSYNC_STATE_DIR")
        .env_remove("RUST_LOG");
    cmd
}

fn stored_vpc_ids(dir: &Path) -> Vec<String> {
    let content = fs::read_to_string(dir.join(".hcsync/store.json")).unwrap();
    let snapshot: Value = serde_json::from_str(&content).unwrap();
    snapshot["tables"]["vpcs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["cloud_id"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("hcsync").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("sync-lb"))
        .stdout(predicate::str::contains("sync-cvm-rel"))
        .stdout(predicate::str::contains("sweep"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("hcsync").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hcsync"));
}

#[test]
fn test_config_shows_effective_values() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("hcsync.yaml"), "sync_concurrency: 3\n").unwrap();

    hcsync(temp.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync_concurrency: 3"))
        .stdout(predicate::str::contains("lb_describe_max: 20"));
}

#[test]
fn test_sync_vpc_persists_store() {
    let temp = TempDir::new().unwrap();
    write_cloud(temp.path(), vec![vpc("vpc-1", "main"), vpc("vpc-2", "backup")]);

    hcsync(temp.path())
        .args(["--cloud", "cloud.json", "sync", "vpc"])
        .args(["--account", ACCOUNT, "--region", REGION])
        .assert()
        .success()
        .stdout(predicate::str::contains("vpc"))
        .stdout(predicate::str::contains("2 created"));

    assert_eq!(stored_vpc_ids(temp.path()), vec!["vpc-1", "vpc-2"]);
    assert!(!temp.path().join(".hcsync/lock.json").exists());
}

#[test]
fn test_rerun_converges_with_cloud() {
    let temp = TempDir::new().unwrap();
    write_cloud(temp.path(), vec![vpc("vpc-1", "main"), vpc("vpc-2", "backup")]);

    let run = || {
        hcsync(temp.path())
            .args(["--cloud", "cloud.json", "sync", "vpc"])
            .args(["--account", ACCOUNT, "--region", REGION])
            .assert()
            .success();
    };
    run();

    write_cloud(temp.path(), vec![vpc("vpc-2", "renamed")]);
    run();

    assert_eq!(stored_vpc_ids(temp.path()), vec!["vpc-2"]);
    let content = fs::read_to_string(temp.path().join(".hcsync/store.json")).unwrap();
    assert!(content.contains("renamed"));
    assert!(temp.path().join(".hcsync/store.json.backup").exists());
}

#[test]
fn test_sweep_removes_vanished_rows() {
    let temp = TempDir::new().unwrap();
    write_cloud(temp.path(), vec![vpc("vpc-1", "main"), vpc("vpc-2", "backup")]);
    hcsync(temp.path())
        .args(["--cloud", "cloud.json", "sync", "vpc"])
        .args(["--account", ACCOUNT, "--region", REGION])
        .assert()
        .success();

    write_cloud(temp.path(), vec![vpc("vpc-1", "main")]);
    hcsync(temp.path())
        .args(["--cloud", "cloud.json", "sweep", "vpc"])
        .args(["--account", ACCOUNT, "--region", REGION])
        .assert()
        .success()
        .stdout(predicate::str::contains("vpc swept"));

    assert_eq!(stored_vpc_ids(temp.path()), vec!["vpc-1"]);
}

#[test]
fn test_account_mismatch_is_rejected() {
    let temp = TempDir::new().unwrap();
    write_cloud(temp.path(), vec![vpc("vpc-1", "main")]);

    hcsync(temp.path())
        .args(["--cloud", "cloud.json", "sync", "vpc"])
        .args(["--account", "acc-other", "--region", REGION])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not acc-other"));

    assert!(!temp.path().join(".hcsync/store.json").exists());
}

#[test]
fn test_vendor_mismatch_is_rejected() {
    let temp = TempDir::new().unwrap();
    write_cloud(temp.path(), vec![vpc("vpc-1", "main")]);

    hcsync(temp.path())
        .args(["--cloud", "cloud.json", "sync", "vpc", "--vendor", "aws"])
        .args(["--account", ACCOUNT, "--region", REGION])
        .assert()
        .failure()
        .stderr(predicate::str::contains("belongs to tcloud"));
}

#[test]
fn test_missing_region_fails_sync() {
    let temp = TempDir::new().unwrap();
    write_cloud(temp.path(), vec![vpc("vpc-1", "main")]);

    hcsync(temp.path())
        .args(["--cloud", "cloud.json", "sync", "vpc", "--account", ACCOUNT])
        .assert()
        .failure()
        .stderr(predicate::str::contains("region is required"));
}

#[test]
fn test_missing_cloud_inventory() {
    let temp = TempDir::new().unwrap();

    hcsync(temp.path())
        .args(["sync", "vpc", "--account", ACCOUNT, "--region", REGION])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--cloud"));
}

#[test]
fn test_rule_sync_points_at_listener() {
    let temp = TempDir::new().unwrap();
    write_cloud(temp.path(), Vec::new());

    hcsync(temp.path())
        .args(["--cloud", "cloud.json", "sync", "rule"])
        .args(["--account", ACCOUNT, "--region", REGION])
        .assert()
        .failure()
        .stderr(predicate::str::contains("synced through its listener"));
}

#[test]
fn test_listener_sync_requires_lb_id() {
    let temp = TempDir::new().unwrap();
    write_cloud(temp.path(), Vec::new());

    hcsync(temp.path())
        .args(["--cloud", "cloud.json", "sync", "listener"])
        .args(["--account", ACCOUNT, "--region", REGION])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--lb-id"));
}

#[test]
fn test_unknown_resource_kind() {
    let temp = TempDir::new().unwrap();

    hcsync(temp.path())
        .args(["sync", "bucket", "--account", ACCOUNT])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bucket"));
}

#[test]
fn test_gcp_rejects_security_group_relation() {
    let temp = TempDir::new().unwrap();
    let inventory = json!({
        "vendor": "gcp",
        "account_id": ACCOUNT,
        "resources": { REGION: {} }
    });
    fs::write(temp.path().join("cloud.json"), inventory.to_string()).unwrap();

    hcsync(temp.path())
        .args(["--cloud", "cloud.json", "sync-cvm-rel", "--rel", "security-group"])
        .args(["--account", ACCOUNT, "--region", REGION])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gcp"));
}
