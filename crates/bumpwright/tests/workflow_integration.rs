//! Full-workflow integration tests against throwaway git repositories.
//!
//! Each test builds a small workspace repo under a temp directory, drives
//! the binary with `-C`, and inspects the resulting manifests, commits,
//! and tags. Tests return early when git is unavailable.

use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

fn git_available() -> bool {
    StdCommand::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(root: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .expect("git invocation");
    assert!(
        status.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&status.stderr)
    );
}

/// Root manifest + two members; `app` depends on `lib`.
fn scaffold_workspace(root: &Path) {
    fs::write(
        root.join("package.json"),
        "{\n  \"name\": \"monorepo\",\n  \"version\": \"1.0.0\",\n  \"workspaces\": [\"packages/*\"]\n}\n",
    )
    .unwrap();
    fs::create_dir_all(root.join("packages/lib")).unwrap();
    fs::create_dir_all(root.join("packages/app")).unwrap();
    fs::write(
        root.join("packages/lib/package.json"),
        "{\n  \"name\": \"lib\",\n  \"version\": \"1.0.0\"\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("packages/app/package.json"),
        "{\n  \"name\": \"app\",\n  \"version\": \"1.0.0\",\n  \"dependencies\": {\n    \"lib\": \"^1.0.0\"\n  }\n}\n",
    )
    .unwrap();

    git(root, &["init", "--quiet", "-b", "main"]);
    git(root, &["config", "user.email", "test@example.com"]);
    git(root, &["config", "user.name", "Test"]);
    git(root, &["add", "."]);
    git(root, &["commit", "--quiet", "-m", "chore: scaffold workspace"]);
    git(root, &["tag", "-a", "v1.0.0", "-m", "v1.0.0"]);
}

#[test]
fn plan_shows_pending_minor_bump() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    scaffold_workspace(tmp.path());

    fs::write(tmp.path().join("packages/lib/feature.txt"), "x\n").unwrap();
    git(tmp.path(), &["add", "."]);
    git(
        tmp.path(),
        &["commit", "--quiet", "-m", "feat: lib gains a feature"],
    );

    cmd()
        .arg("-C")
        .arg(tmp.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("lib"))
        .stdout(predicate::str::contains("1.1.0"))
        .stdout(predicate::str::contains("Changes pending"));

    // Planning never mutates the tree.
    let manifest = fs::read_to_string(tmp.path().join("packages/lib/package.json")).unwrap();
    assert!(manifest.contains("\"version\": \"1.0.0\""));
}

#[test]
fn plan_json_reports_decisions() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    scaffold_workspace(tmp.path());

    let output = cmd()
        .arg("--json")
        .arg("-C")
        .arg(tmp.path())
        .arg("plan")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(plan["branch"], serde_json::json!("main"));
    let decisions = plan["decisions"].as_array().unwrap();
    // lib, app, and the root package
    assert_eq!(decisions.len(), 3);
    // Quiescent repo: reference equals current versions, nothing to do.
    assert!(decisions.iter().all(|d| d["next"].is_null()));
}

#[test]
fn run_bumps_commits_and_tags() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    scaffold_workspace(tmp.path());

    fs::write(tmp.path().join("packages/lib/feature.txt"), "x\n").unwrap();
    git(tmp.path(), &["add", "."]);
    git(
        tmp.path(),
        &["commit", "--quiet", "-m", "feat: lib gains a feature"],
    );

    let output = cmd()
        .arg("--json")
        .arg("-C")
        .arg(tmp.path())
        .arg("run")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let bumps = report["bumps"].as_array().unwrap();
    assert!(
        bumps
            .iter()
            .any(|b| b["package"] == "lib" && b["version"] == "1.1.0")
    );

    // The manifest landed on disk and in a commit.
    let manifest = fs::read_to_string(tmp.path().join("packages/lib/package.json")).unwrap();
    assert!(manifest.contains("\"version\": \"1.1.0\""));

    // ^1.0.0 already accepts 1.1.0, so no cascade update was needed.
    assert!(report["dependency_updates"].as_array().unwrap().is_empty());

    // The root package was tagged at its new version.
    let tag = report["tag"].as_str().unwrap();
    assert!(tag.starts_with('v'));

    let tags = StdCommand::new("git")
        .args(["tag", "--list"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&tags.stdout).contains(tag));
}

#[test]
fn run_cascades_major_bump_into_dependents() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    scaffold_workspace(tmp.path());

    fs::write(tmp.path().join("packages/lib/break.txt"), "x\n").unwrap();
    git(tmp.path(), &["add", "."]);
    git(
        tmp.path(),
        &["commit", "--quiet", "-m", "feat!: lib drops the old api"],
    );

    let output = cmd()
        .arg("--json")
        .arg("-C")
        .arg(tmp.path())
        .arg("run")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let bumps = report["bumps"].as_array().unwrap();
    assert!(
        bumps
            .iter()
            .any(|b| b["package"] == "lib" && b["version"] == "2.0.0" && b["kind"] == "major")
    );

    // app's spec was rewritten and persisted.
    let updates = report["dependency_updates"].as_array().unwrap();
    assert!(
        updates
            .iter()
            .any(|u| u["package"] == "app" && u["spec"] == "^2.0.0")
    );
    let manifest = fs::read_to_string(tmp.path().join("packages/app/package.json")).unwrap();
    assert!(manifest.contains("\"lib\": \"^2.0.0\""));
}

#[test]
fn dry_run_leaves_tree_untouched() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    scaffold_workspace(tmp.path());

    fs::write(tmp.path().join("packages/lib/feature.txt"), "x\n").unwrap();
    git(tmp.path(), &["add", "."]);
    git(
        tmp.path(),
        &["commit", "--quiet", "-m", "feat: lib gains a feature"],
    );

    cmd()
        .arg("-C")
        .arg(tmp.path())
        .arg("run")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));

    let manifest = fs::read_to_string(tmp.path().join("packages/lib/package.json")).unwrap();
    assert!(manifest.contains("\"version\": \"1.0.0\""));
}

#[test]
fn config_file_controls_flow_selection() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    scaffold_workspace(tmp.path());

    // A release flow that produces prereleases from release/* branches.
    fs::write(
        tmp.path().join(".bumpwright.toml"),
        r#"[[flows]]
name = "releases"
from = "release/*"
versioning = "pre-release"
"#,
    )
    .unwrap();
    git(tmp.path(), &["add", "."]);
    git(tmp.path(), &["commit", "--quiet", "-m", "chore: add config"]);
    git(tmp.path(), &["checkout", "--quiet", "-b", "release/1.1"]);
    fs::write(tmp.path().join("packages/lib/feature.txt"), "x\n").unwrap();
    git(tmp.path(), &["add", "."]);
    git(
        tmp.path(),
        &["commit", "--quiet", "-m", "feat: lib gains a feature"],
    );

    let output = cmd()
        .arg("--json")
        .arg("-C")
        .arg(tmp.path())
        .arg("plan")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(plan["flow"], serde_json::json!("releases"));
    let decisions = plan["decisions"].as_array().unwrap();
    let lib = decisions.iter().find(|d| d["package"] == "lib").unwrap();
    assert_eq!(lib["policy"], serde_json::json!("pre-release"));
    assert_eq!(lib["next"], serde_json::json!("1.1.0-1"));
}
