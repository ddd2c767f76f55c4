//! Plan command — preview a run without mutating anything.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use bumpwright_core::config::Config;
use bumpwright_core::engine;
use bumpwright_core::git::Git;

/// Arguments for the `plan` subcommand.
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    // No subcommand-specific arguments; uses global --json flag
}

/// Show what a run would decide for every package.
#[instrument(name = "cmd_plan", skip_all, fields(json_output = global_json))]
pub fn cmd_plan(
    _args: PlanArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!("executing plan command");

    let git = Git::new(cwd);
    let plan = engine::plan_run(&git, config).context("planning failed")?;

    if global_json {
        let json = serde_json::json!({
            "branch": plan.branch,
            "flow": plan.flow.as_ref().map(|f| f.name.clone()),
            "reference": plan.reference,
            "decisions": plan.decisions,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("{}: {}", "Branch".bold(), plan.branch);
    if let Some(ref flow) = plan.flow {
        println!("{}: {} ({})", "Flow".dimmed(), flow.name, flow.policy());
    }
    println!(
        "{}: {} @ {}",
        "Reference".dimmed(),
        plan.reference.version,
        plan.reference
            .commit
            .as_deref()
            .map_or("none", |c| &c[..c.len().min(10)])
    );
    println!();

    for decision in &plan.decisions {
        println!("{}", super::decision_line(decision));
    }

    println!();
    if plan.has_changes() {
        let severity = engine::overall_severity(&plan.decisions)
            .map_or_else(|| "-".to_string(), |k| k.to_string());
        println!("{} (severity: {severity})", "Changes pending.".bold());
    } else {
        println!("{}", "Nothing to do.".dimmed());
    }

    Ok(())
}
