//! Run command — thin CLI layer over `bumpwright_core::engine`.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use bumpwright_core::config::Config;
use bumpwright_core::engine;
use bumpwright_core::git::Git;
use bumpwright_core::pkgmgr::PackageManager;

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Plan and display only; make no changes
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute a full bump run: plan, apply, cascade, tag.
#[instrument(name = "cmd_run", skip_all, fields(dry_run = args.dry_run))]
pub fn cmd_run(
    args: RunArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!("executing run command");

    let git = Git::new(cwd);
    let plan = engine::plan_run(&git, config).context("planning failed")?;

    if !global_json {
        println!("{}: {}", "Branch".bold(), plan.branch);
        for decision in &plan.decisions {
            println!("{}", super::decision_line(decision));
        }
        println!();
    }

    if args.dry_run {
        if global_json {
            let json = serde_json::json!({
                "branch": plan.branch,
                "decisions": plan.decisions,
                "dry_run": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else {
            println!("{}", "Dry run — no changes made.".yellow());
        }
        return Ok(());
    }

    if !plan.has_changes() {
        if global_json {
            println!("{}", serde_json::json!({"bumps": [], "changed": false}));
        } else {
            println!("{}", "Nothing to do.".dimmed());
        }
        return Ok(());
    }

    let pm = PackageManager::new(&config.package_manager.command);
    let report = plan.execute(&git, &pm, config).context("run failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for bump in &report.bumps {
        println!(
            "  {} {} bumped to {} ({})",
            "✓".green(),
            bump.package.bold(),
            bump.result.version.to_string().green().bold(),
            bump.result.kind
        );
    }
    for update in &report.dependency_updates {
        println!(
            "  {} {} now requires {} {}",
            "→".dimmed(),
            update.package,
            update.dependency,
            update.spec.cyan()
        );
    }
    for failure in &report.test_failures {
        println!(
            "  {} {}: compatibility test failed",
            "!".yellow(),
            failure.package
        );
    }
    for error in &report.errors {
        println!("  {} {}: {}", "✗".red(), error.package, error.error);
    }
    if let Some(ref tag) = report.tag {
        println!("  {} tagged {}", "✓".green(), tag.bold());
    }

    Ok(())
}
