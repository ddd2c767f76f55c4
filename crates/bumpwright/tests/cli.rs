//! End-to-end CLI integration tests
//!
//! These tests invoke the compiled binary as a subprocess to verify
//! that the CLI behaves correctly from a user's perspective.

use assert_cmd::Command;
use predicates::prelude::*;

/// Returns a Command configured to run our binary.
///
/// Note: `cargo_bin` is marked deprecated for edge cases involving custom
/// cargo build directories, but works correctly for standard project layouts.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("Options:"));
}

#[test]
fn short_help_flag_shows_usage() {
    cmd()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_lists_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("doctor"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("run"));
}

// =============================================================================
// Error handling
// =============================================================================

#[test]
fn unknown_subcommand_fails() {
    cmd()
        .arg("not-a-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn plan_outside_repo_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    cmd()
        .arg("-C")
        .arg(tmp.path())
        .arg("plan")
        .assert()
        .failure();
}

#[test]
fn chdir_to_missing_directory_fails() {
    cmd()
        .arg("-C")
        .arg("/definitely/not/a/real/path")
        .arg("doctor")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to change directory"));
}

// =============================================================================
// Doctor
// =============================================================================

#[test]
fn doctor_reports_outside_repo() {
    let tmp = tempfile::TempDir::new().unwrap();
    cmd()
        .arg("-C")
        .arg(tmp.path())
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("Git repository"))
        .stdout(predicate::str::contains("Some checks failed"));
}

#[test]
fn doctor_json_is_parseable() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = cmd()
        .arg("--json")
        .arg("-C")
        .arg(tmp.path())
        .arg("doctor")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(report.get("checks").is_some());
    assert_eq!(report["all_passed"], serde_json::json!(false));
}
