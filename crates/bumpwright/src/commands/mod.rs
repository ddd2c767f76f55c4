//! Command implementations

pub mod doctor;

pub mod plan;

pub mod run;

use bumpwright_core::engine::PackageDecision;
use owo_colors::OwoColorize;

/// Render one decision line for human output.
///
/// Shared between `plan` (preview) and `run` (confirmation) so both show
/// the same shape.
pub fn decision_line(decision: &PackageDecision) -> String {
    let name = if decision.is_root {
        format!("{} (root)", decision.package)
    } else {
        decision.package.clone()
    };

    match &decision.next {
        Some(next) => format!(
            "  {} {}: {} → {} [{}]",
            "●".green(),
            name.bold(),
            decision.current.to_string().dimmed(),
            next.to_string().green().bold(),
            decision.policy
        ),
        None => format!(
            "  {} {}: {} (no change)",
            "○".dimmed(),
            name,
            decision.current.to_string().dimmed()
        ),
    }
}
