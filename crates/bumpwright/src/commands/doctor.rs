//! Doctor command — diagnose configuration and environment.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use bumpwright_core::config::{self, Config};
use bumpwright_core::git::Git;
use bumpwright_core::graph::DependencyGraph;
use bumpwright_core::pkgmgr::PackageManager;
use bumpwright_core::workspace;

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

/// A single diagnostic result.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Human-readable name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Description of the result (reason for failure, or confirmation).
    pub message: String,
}

/// Full doctor report.
#[derive(Debug, Serialize)]
struct DoctorReport {
    checks: Vec<CheckResult>,
    all_passed: bool,
    config_file: Option<String>,
    user_config_dir: Option<String>,
}

fn check(name: &str, passed: bool, message: impl Into<String>) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        passed,
        message: message.into(),
    }
}

impl DoctorReport {
    fn gather(config: &Config, cwd: &camino::Utf8Path) -> Self {
        let mut checks = Vec::new();

        // Config discovery and validation
        let config_file = config::find_project_config(cwd);
        checks.push(check(
            "Configuration",
            true,
            config_file.as_ref().map_or_else(
                || "No project config found; using defaults".to_string(),
                |p| format!("Loaded from {p}"),
            ),
        ));
        checks.push(match config.validate() {
            Ok(()) => check("Config validation", true, "Flows and templates are valid"),
            Err(e) => check("Config validation", false, e.to_string()),
        });

        // Git repository
        let git = Git::new(cwd);
        let in_repo = matches!(git.is_inside_repo(), Ok(true));
        checks.push(if in_repo {
            check("Git repository", true, "Inside a git repository")
        } else {
            check("Git repository", false, "Not inside a git repository")
        });

        // Workspace and dependency graph
        match workspace::discover(cwd, &config.manifest.file) {
            Ok(ws) => {
                checks.push(check(
                    "Workspace",
                    true,
                    format!(
                        "{} with {} member packages",
                        ws.root_manifest.name(),
                        ws.packages.len()
                    ),
                ));
                let graph = DependencyGraph::build(&ws.packages);
                checks.push(match graph.topo_order() {
                    Ok(_) => check("Dependency graph", true, "No cycles"),
                    Err(e) => check("Dependency graph", false, e.to_string()),
                });
            }
            Err(e) => {
                checks.push(check("Workspace", false, e.to_string()));
            }
        }

        // Package manager availability
        let pm = PackageManager::new(&config.package_manager.command);
        checks.push(if pm.is_available() {
            check(
                "Package manager",
                true,
                format!("'{}' found on PATH", pm.command()),
            )
        } else {
            check(
                "Package manager",
                false,
                format!("'{}' not found on PATH", pm.command()),
            )
        });

        let all_passed = checks.iter().all(|c| c.passed);
        Self {
            checks,
            all_passed,
            config_file: config_file.map(|p| p.to_string()),
            user_config_dir: config::user_config_dir().map(|p| p.to_string()),
        }
    }
}

/// Run diagnostics and report environment status.
#[instrument(name = "cmd_doctor", skip_all, fields(json_output = global_json))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!("executing doctor command");

    let report = DoctorReport::gather(config, cwd);

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "bumpwright doctor".bold().underline());
    println!();
    for c in &report.checks {
        let marker = if c.passed {
            "✓".green().to_string()
        } else {
            "✗".red().to_string()
        };
        println!("  {} {}: {}", marker, c.name.bold(), c.message);
    }
    println!();
    if let Some(ref dir) = report.user_config_dir {
        println!("{}: {}", "User config dir".dimmed(), dir);
    }
    if report.all_passed {
        println!("{}", "All checks passed.".green().bold());
    } else {
        println!("{}", "Some checks failed.".yellow().bold());
    }

    Ok(())
}
