//! CLI smoke tests for envstore.
//!
//! These tests run the real binary and check exit codes and output for
//! every subcommand.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const HASH: &str = "c7afdeffbe2bda7d16ca69beecc8bebeb29280a95d4f3ed92849e4047710923b";
const NAME: &str = "this-is-a-long-environment-name";
const SCHEDULED_ON: &str = "2023-11-05T03:54:10.510258";

/// Get a Command for the envstore binary, isolated from user settings.
fn envstore_cmd(config_dir: &TempDir) -> Command {
  let mut cmd = cargo_bin_cmd!("envstore");
  cmd
    .env("ENVSTORE_CONFIG", config_dir.path().join("settings.json"))
    .env_remove("ENVSTORE_BUILD_KEY_VERSION")
    .env_remove("RUST_LOG");
  cmd
}

fn encode_args(version: &str) -> Vec<String> {
  [
    "key",
    "encode",
    "--id",
    "12345678",
    "--name",
    NAME,
    "--hash",
    HASH,
    "--scheduled-on",
    SCHEDULED_ON,
    "--key-version",
    version,
  ]
  .map(String::from)
  .to_vec()
}

#[test]
fn info_reports_key_versions() {
  let config = TempDir::new().unwrap();
  envstore_cmd(&config)
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("Active version"))
    .stdout(predicate::str::contains("(1, 2, 3)"));
}

#[test]
fn info_json_uses_settings_file() {
  let config = TempDir::new().unwrap();
  std::fs::write(config.path().join("settings.json"), r#"{"build_key_version": 1}"#).unwrap();

  let output = envstore_cmd(&config).args(["info", "-o", "json"]).output().unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["build_key_version"], 1);
  assert_eq!(json["supported_build_key_versions"], serde_json::json!([1, 2, 3]));
}

#[test]
fn key_encode_each_version() {
  let config = TempDir::new().unwrap();

  envstore_cmd(&config)
    .args(encode_args("1"))
    .assert()
    .success()
    .stdout(format!("{}-20231105-035410-510258-12345678-{}\n", HASH, NAME));

  envstore_cmd(&config)
    .args(encode_args("2"))
    .assert()
    .success()
    .stdout(format!("c7afdeff-1699156450-12345678-{}\n", NAME));

  envstore_cmd(&config)
    .args(encode_args("3"))
    .assert()
    .success()
    .stdout(predicate::str::is_match("^[0-9a-f]{32}\n$").unwrap());
}

#[test]
fn key_version_from_environment() {
  let config = TempDir::new().unwrap();
  let mut args = encode_args("1");
  args.truncate(args.len() - 2);

  envstore_cmd(&config)
    .env("ENVSTORE_BUILD_KEY_VERSION", "1")
    .args(args)
    .assert()
    .success()
    .stdout(predicate::str::starts_with(HASH));
}

#[test]
fn invalid_key_version_is_rejected() {
  let config = TempDir::new().unwrap();
  envstore_cmd(&config)
    .args(encode_args("4"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid build key version: 4, expected: (1, 2, 3)"));
}

#[test]
fn invalid_hash_is_rejected() {
  let config = TempDir::new().unwrap();
  let mut args = encode_args("2");
  args[7] = "not-a-hash".to_string();

  envstore_cmd(&config).args(args).assert().failure();
}

#[test]
fn key_decode_recovers_build_id() {
  let config = TempDir::new().unwrap();
  envstore_cmd(&config)
    .args(["key", "decode", &format!("c7afdeff-1699156450-12345678-{}", NAME)])
    .assert()
    .success()
    .stdout(predicate::str::contains("12345678"));

  let output = envstore_cmd(&config)
    .args(["-o", "json", "key", "decode"])
    .arg(format!("{}-20231105-035410-510258-42-{}", HASH, NAME))
    .output()
    .unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json, serde_json::json!({ "version": 1, "build_id": 42 }));
}

#[test]
fn key_decode_version_three_needs_store() {
  let config = TempDir::new().unwrap();
  envstore_cmd(&config)
    .args(["key", "decode", "0fc2d92c1d79907ee723cc000c3ac0a7"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("build store"));
}

#[test]
fn key_decode_malformed_fails() {
  let config = TempDir::new().unwrap();
  envstore_cmd(&config)
    .args(["key", "decode", "not-a-key"])
    .assert()
    .failure();
}

#[cfg(unix)]
#[test]
fn run_prints_captured_output() {
  let config = TempDir::new().unwrap();
  envstore_cmd(&config)
    .args(["run", "--", "echo", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("hello\n"))
    .stdout(predicate::str::contains("Action run completed in "));
}

#[cfg(unix)]
#[test]
fn run_separates_stderr_on_request() {
  let config = TempDir::new().unwrap();
  envstore_cmd(&config)
    .args(["run", "--shell", "--no-redirect-stderr", "--", "echo out; echo err 1>&2"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("out\n"))
    .stderr(predicate::str::contains("err"));
}

#[test]
fn run_propagates_exit_code() {
  let config = TempDir::new().unwrap();
  envstore_cmd(&config)
    .args(["run", "--shell", "--", "exit 3"])
    .assert()
    .code(3);
}

#[cfg(unix)]
#[test]
fn run_times_out() {
  let config = TempDir::new().unwrap();
  envstore_cmd(&config)
    .args(["run", "--timeout", "200ms", "--", "sleep", "5"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("timed out"));
}

#[test]
fn prefix_stats_rejects_plain_directories() {
  let config = TempDir::new().unwrap();
  let dir = TempDir::new().unwrap();
  envstore_cmd(&config)
    .args(["prefix", "stats"])
    .arg(dir.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("not a conda prefix"));
}

#[test]
fn prefix_stats_reports_disk_usage() {
  let config = TempDir::new().unwrap();
  let dir = TempDir::new().unwrap();
  let prefix = dunce::canonicalize(dir.path()).unwrap().join("env");
  std::fs::create_dir_all(prefix.join("conda-meta")).unwrap();
  std::fs::write(prefix.join("conda-meta").join("history"), vec![b'x'; 2048]).unwrap();

  let output = envstore_cmd(&config)
    .args(["-o", "json", "prefix", "stats"])
    .arg(&prefix)
    .output()
    .unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["disk_usage"], 2048);

  envstore_cmd(&config)
    .args(["prefix", "stats"])
    .arg(&prefix)
    .assert()
    .success()
    .stdout(predicate::str::contains("2.0 KB"));
}
