//! End-to-end tests of the hqlunit binary

use super::fixtures::single_suite_repo;
use std::process::Command;
use tempfile::TempDir;

fn hqlunit() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hqlunit"))
}

#[test]
fn test_version_flag() {
    let output = hqlunit().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("hqlunit"));
}

#[test]
fn test_missing_engine_is_config_exit() {
    let dir = single_suite_repo();
    let status = hqlunit().arg("repo").arg(dir.path()).status().unwrap();
    assert_eq!(status.code(), Some(2));
}

#[test]
fn test_missing_repo_root_is_config_exit() {
    let dir = TempDir::new().unwrap();
    let status = hqlunit()
        .args(["repo", "--engine-command", "sh"])
        .arg(dir.path().join("absent"))
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
}

#[test]
fn test_unknown_output_format_is_config_exit() {
    let dir = single_suite_repo();
    let status = hqlunit()
        .args(["repo", "--engine-command", "sh", "--output", "yaml"])
        .arg(dir.path())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
}

#[cfg(unix)]
#[test]
fn test_passing_repository_exits_zero_with_json_report() {
    let dir = single_suite_repo();
    let report = dir.path().join("report.json");
    let status = hqlunit()
        .args([
            "repo",
            "--engine-command",
            "sh -c true",
            "--output",
            "json",
            "--report-file",
        ])
        .arg(&report)
        .arg(dir.path())
        .status()
        .unwrap();

    // `sh -c true` prints nothing, so the case is INVALID, which is no failure
    assert_eq!(status.code(), Some(0));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["summary"]["total"], 1);
    assert_eq!(json["summary"]["invalid"], 1);
}
