//! Integration tests for the `vds` binary.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_help_lists_options() {
    let mut cmd = cargo_bin_cmd!("vds");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-level"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_missing_profiles_fail_while_loading() {
    let tmp = tempdir().unwrap();

    let mut cmd = cargo_bin_cmd!("vds");
    cmd.current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("circuit 'ckt5' failed while loading"))
        .stderr(predicate::str::contains("profiles"));

    // Nothing is left behind in the output directory
    let data = tmp.path().join("data");
    assert!(!data.exists() || fs::read_dir(&data).unwrap().next().is_none());
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(&config, "[output]\nformat = \"xlsx\"\n").unwrap();

    let mut cmd = cargo_bin_cmd!("vds");
    cmd.current_dir(tmp.path())
        .args(["--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration failed"))
        .stderr(predicate::str::contains("bad.toml"));
}

#[test]
fn test_config_file_in_working_directory_is_used() {
    let tmp = tempdir().unwrap();
    fs::write(
        tmp.path().join("vds.toml"),
        r#"
[output]
dir = "out"

[[circuits]]
name = "feeder"
master = "feeder/Master.dss"
"#,
    )
    .unwrap();

    let mut cmd = cargo_bin_cmd!("vds");
    cmd.current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("circuit 'feeder' failed while loading"));
}
