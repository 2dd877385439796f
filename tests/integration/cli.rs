use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::common::{PROBE_DUMP, write_file};
use crate::tag_diff::two_releases;

/// The binary with configuration and CMT lookups isolated from the host.
fn cmtkit(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cmtkit").unwrap();
    cmd.current_dir(dir.path())
        .env("CMTKIT_CONFIG_PATH", dir.path().join("absent.toml"))
        .env_remove("CMT_BIN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    cmtkit(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("clients"))
        .stdout(predicate::str::contains("tag-diff"));
}

#[test]
fn test_uses_prints_tree() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "uses.cmt", PROBE_DUMP);
    cmtkit(&dir)
        .args(["uses", "uses.cmt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AtlasCoreRelease"))
        .stdout(predicate::str::contains("    Tools/A (A-00-00-01)"));
}

#[test]
fn test_uses_direct_clients_json() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "uses.cmt", PROBE_DUMP);
    let output = cmtkit(&dir).args(["uses", "uses.cmt", "--clients-of", "A", "--json"]).output().unwrap();
    assert!(output.status.success());

    let clients: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = clients.as_array().unwrap().iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["AtlasCoreRelease", "B"]);
}

#[test]
fn test_uses_missing_dump() {
    let dir = TempDir::new().unwrap();
    cmtkit(&dir)
        .args(["uses", "nope.cmt"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_tag_diff() {
    let dir = TempDir::new().unwrap();
    two_releases(dir.path());
    cmtkit(&dir)
        .args(["tag-diff", "ref", "chk"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Control/AthenaKernel"))
        .stdout(predicate::str::contains("::: found [2] tags which are different"));
}

#[test]
fn test_projects_release_needs_no_cmt() {
    let dir = TempDir::new().unwrap();
    cmtkit(&dir)
        .args(["projects", "--release", "LCGCMT"])
        .assert()
        .success()
        .stdout("LCG_Release\n");
}

#[test]
fn test_release_override_from_config() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "cmtkit.toml", "[project_releases]\nGAUDI = \"GaudiRelease\"\n");
    cmtkit(&dir)
        .args(["--config", "cmtkit.toml", "projects", "--release", "GAUDI"])
        .assert()
        .success()
        .stdout("GaudiRelease\n");
}

#[test]
fn test_missing_cmt_binary_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("no-such-cmt.exe");
    cmtkit(&dir)
        .arg("--cmt")
        .arg(&missing)
        .args(["clients", "AthenaKernel"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "bad.toml", "top_project = [\n");
    cmtkit(&dir)
        .args(["--config", "bad.toml", "projects", "--release", "AtlasCore"])
        .assert()
        .failure()
        .code(1);
}
