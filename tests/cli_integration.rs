//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test.
fn hookhost() -> Command {
    Command::cargo_bin("hookhost").unwrap()
}

fn plugin_folder() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("alpha/plugin.toml")
        .write_str("[plugin]\nidentifier = \"alpha\"\nversion = \"1.2.0\"\nhooks = [\"host.server.http.routes\"]\n")
        .unwrap();
    temp.child("beta/plugin.toml")
        .write_str("[plugin]\nidentifier = \"beta\"\nversion = \"0.1.0\"\nhooks = [\"host.comm.protocol.gcode\"]\n")
        .unwrap();
    temp.child("gamma.toml").write_str("[plugin]\nidentifier = \"alpha\"\n").unwrap();
    temp.child("_hidden/plugin.toml").write_str("[plugin]\nidentifier = \"hidden\"\n").unwrap();
    temp
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    hookhost().arg("--help").assert().success().stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    hookhost()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// Scan Command Tests
// ============================================================================

#[test]
fn test_scan_text_output() {
    let temp = plugin_folder();
    let settings = assert_fs::TempDir::new().unwrap();
    let config = settings.child("empty.toml");
    config.write_str("").unwrap();

    hookhost()
        .args(["scan", "--config"])
        .arg(config.path())
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("validated"))
        .stdout(predicate::str::contains("rejected-obsolete-hook"))
        .stdout(predicate::str::contains("duplicate"))
        .stdout(predicate::str::contains("hidden").not())
        .stdout(predicate::str::contains("Total: 2 plugins"));
}

#[test]
fn test_scan_json_output() {
    let temp = plugin_folder();
    let settings = assert_fs::TempDir::new().unwrap();
    let config = settings.child("disabled.toml");
    config.write_str("disabled = [\"alpha\"]\n").unwrap();

    let output = hookhost()
        .args(["scan", "--format", "json", "--config"])
        .arg(config.path())
        .arg(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let plugins = report["plugins"].as_array().unwrap();
    assert_eq!(plugins.len(), 2);
    assert_eq!(plugins[0]["identifier"], "alpha");
    assert_eq!(plugins[0]["state"], "disabled");
    assert_eq!(plugins[0]["restart_required"], true);
    assert_eq!(plugins[1]["state"], "rejected-obsolete-hook");
    assert_eq!(report["duplicates"].as_array().unwrap().len(), 1);
}

#[test]
fn test_scan_readable_manifest_replaces_unreadable() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("foo/plugin.toml").write_str("this is [[not toml").unwrap();
    temp.child("goo.toml").write_str("[plugin]\nidentifier = \"foo\"\n").unwrap();
    let settings = assert_fs::TempDir::new().unwrap();
    let config = settings.child("empty.toml");
    config.write_str("").unwrap();

    let output = hookhost()
        .args(["scan", "--format", "json", "--config"])
        .arg(config.path())
        .arg(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let plugins = report["plugins"].as_array().unwrap();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0]["identifier"], "foo");
    assert_eq!(plugins[0]["state"], "validated");

    let duplicates = report["duplicates"].as_array().unwrap();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0]["state"], "rejected-validator");
}

#[test]
fn test_scan_missing_config_fails() {
    hookhost()
        .args(["scan", "--config", "/definitely/not/here.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

// ============================================================================
// Check Command Tests
// ============================================================================

#[test]
fn test_check_valid_manifest() {
    let temp = plugin_folder();

    hookhost()
        .arg("check")
        .arg(temp.child("alpha").path())
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha 1.2.0 is valid"))
        .stdout(predicate::str::contains("host.server.http.routes"));
}

#[test]
fn test_check_reports_host_requirement() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = temp.child("future.toml");
    manifest
        .write_str("[plugin]\nidentifier = \"future\"\n\n[compatibility]\nhost = \">=99\"\n")
        .unwrap();

    hookhost()
        .arg("check")
        .arg(manifest.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("incompatible"));
}

#[test]
fn test_check_invalid_manifest() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = temp.child("bad.toml");
    manifest.write_str("[plugin]\nidentifier = \"has spaces\"\n").unwrap();

    hookhost()
        .arg("check")
        .arg(manifest.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("alphanumeric"));
}
