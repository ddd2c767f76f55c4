//! Run orchestration: plan a workspace bump, then execute it.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_run`]) — match the branch flow, discover the
//!    reference point, classify commits per package, and compute every
//!    package's next version. No mutation happens here.
//! 2. **Execute** ([`RunPlan::execute`]) — write manifests, create
//!    commits, cascade bumps into dependents, and tag.
//!
//! Configuration problems and dependency cycles surface during planning,
//! before anything touches the working tree.

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::commits;
use crate::config::Config;
use crate::error::ConfigError;
use crate::flows::{self, Flow};
use crate::git::{Git, GitError};
use crate::graph::{self, DependencyGraph, DependencyUpdate, GraphError, TestFailure};
use crate::manifest::ManifestError;
use crate::pkgmgr::PackageManager;
use crate::policy::{self, BumpRequest, Policy};
use crate::reference::{self, DiscoveryContext, ReferencePoint};
use crate::tactic::ManeuverError;
use crate::version::{self, BumpKind, BumpResult};
use crate::workspace::{self, Workspace, WorkspaceError};

/// Upper bound on log entries classified per package.
const MAX_LOG_ENTRIES: usize = 500;

/// Errors from run planning and execution.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration failed validation or loading.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A git operation failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Workspace discovery failed.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// The dependency graph is not processable.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Commit classification exhausted its tactics.
    #[error(transparent)]
    Classify(#[from] ManeuverError),

    /// A manifest could not be read or written.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// HEAD is not on a branch.
    #[error("detached HEAD: checkout a branch before bumping")]
    DetachedHead,
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// One package's computed decision.
#[derive(Debug, Clone, Serialize)]
pub struct PackageDecision {
    /// Package name.
    pub package: String,
    /// Directory relative to the repository root (empty for the root).
    pub rel_dir: Utf8PathBuf,
    /// The package's current version.
    pub current: Version,
    /// Severity derived from commits since the reference.
    pub commit_bump: Option<BumpKind>,
    /// Severity already visible between reference and current version.
    pub historical_bump: Option<BumpKind>,
    /// The policy that was applied.
    pub policy: Policy,
    /// The computed next version, `None` for a no-op.
    pub next: Option<Version>,
    /// Whether this is the workspace root package.
    pub is_root: bool,
}

/// A fully planned run, ready to execute.
#[derive(Debug)]
pub struct RunPlan {
    /// The branch the run operates on.
    pub branch: String,
    /// The flow governing the run, when one matched.
    pub flow: Option<Flow>,
    /// The resolved reference point.
    pub reference: ReferencePoint,
    /// Per-package decisions, dependencies before dependents, root last.
    pub decisions: Vec<PackageDecision>,
    workspace: Workspace,
    manifest_file: String,
}

/// A bump recorded in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct PackageBump {
    /// Package name.
    pub package: String,
    /// The outcome.
    #[serde(flatten)]
    pub result: BumpResult,
}

/// A per-package failure that did not abort the run.
#[derive(Debug, Clone, Serialize)]
pub struct PackageError {
    /// Package name.
    pub package: String,
    /// What went wrong.
    pub error: String,
}

/// The outcome of an executed run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Version bumps that were committed.
    pub bumps: Vec<PackageBump>,
    /// Dependency specs rewritten by cascades.
    pub dependency_updates: Vec<DependencyUpdate>,
    /// Non-fatal compatibility test failures.
    pub test_failures: Vec<TestFailure>,
    /// Per-package errors (commit failures and the like).
    pub errors: Vec<PackageError>,
    /// The tag created for the root version, when tagging applied.
    pub tag: Option<String>,
}

/// Plan a run: all decisions, no mutation.
#[instrument(skip_all, fields(root = %git.root()))]
pub fn plan_run(git: &Git, config: &Config) -> EngineResult<RunPlan> {
    // Fatal before any mutation.
    config.validate()?;

    let branch = git.current_branch()?.ok_or(EngineError::DetachedHead)?;
    let flow = flows::match_flow(&config.flows, &branch).cloned();
    let base = flow.as_ref().and_then(|f| f.base.clone());
    debug!(
        %branch,
        flow = flow.as_ref().map_or("-", |f| f.name.as_str()),
        base = base.as_deref().unwrap_or("-"),
        "matched flow"
    );

    let manifest_file = config.manifest.file.clone();
    let mut ctx = DiscoveryContext::new(git, &manifest_file, base, branch.clone());
    ctx.lookback = config.limits.merge_base_lookback;
    ctx.max_scan = config.limits.max_version_scan;
    let reference = reference::discover(ctx);
    info!(
        commit = reference.commit.as_deref().unwrap_or("-"),
        version = %reference.version,
        finalize = reference.finalize,
        force = reference.force_bump,
        "reference point resolved"
    );

    let ws = workspace::discover(git.root(), &manifest_file)?;
    let dep_graph = DependencyGraph::build(&ws.packages);
    // A cycle is a configuration error, raised before any mutation.
    let order = dep_graph.topo_order()?;

    let flow_policy = flow.as_ref().map_or(Policy::DoNothing, Flow::policy);
    let mut decisions = Vec::with_capacity(order.len() + 1);
    for name in &order {
        let Some(pkg) = ws.packages.iter().find(|p| &p.name == name) else {
            continue;
        };
        let rel_dir = pkg
            .dir
            .strip_prefix(&ws.root)
            .unwrap_or(&pkg.dir)
            .to_path_buf();
        let decision = decide(
            git,
            config,
            &flow,
            flow_policy,
            &reference,
            name,
            &rel_dir,
            &pkg.manifest.version(),
            false,
        )?;
        decisions.push(decision);
    }

    // The root package participates last, after every member.
    let root_decision = decide(
        git,
        config,
        &flow,
        flow_policy,
        &reference,
        &ws.root_manifest.name().to_string(),
        Utf8Path::new(""),
        &ws.root_manifest.version(),
        true,
    )?;
    decisions.push(root_decision);

    Ok(RunPlan {
        branch,
        flow,
        reference,
        decisions,
        workspace: ws,
        manifest_file,
    })
}

/// Compute one package's decision.
#[allow(clippy::too_many_arguments)]
fn decide(
    git: &Git,
    config: &Config,
    flow: &Option<Flow>,
    flow_policy: Policy,
    reference: &ReferencePoint,
    name: &str,
    rel_dir: &Utf8Path,
    current: &Version,
    is_root: bool,
) -> EngineResult<PackageDecision> {
    let dir_filter = if rel_dir.as_str().is_empty() {
        None
    } else {
        Some(rel_dir)
    };
    let entries = git.log_entries(reference.commit.as_deref(), dir_filter, MAX_LOG_ENTRIES)?;
    let classification = commits::classify(&entries, reference.commit.as_deref())?;

    let commit_bump = if reference.force_bump {
        // Forced runs must move forward even without qualifying commits.
        classification.severity.or(Some(BumpKind::Patch))
    } else {
        classification.severity
    };
    let historical_bump = policy::historical_bump(&reference.version, current);

    // On the base branch itself, a flow without explicit versioning
    // finalizes outstanding prereleases.
    let base_policy = if flow_policy == Policy::DoNothing && reference.finalize {
        Policy::Finalize
    } else {
        flow_policy
    };
    let effective =
        policy::effective_policy(base_policy, commit_bump, historical_bump, reference.force_bump);

    let sync_source = if effective == Policy::Sync {
        sync_source_version(git, config, flow.as_ref(), rel_dir)
    } else {
        None
    };

    let request = BumpRequest {
        current,
        commit_bump,
        historical_bump,
        sync_source: sync_source.as_ref(),
    };
    let next = policy::bump_version(effective, &request);

    debug!(
        package = name,
        %current,
        policy = %effective,
        commit_bump = ?commit_bump,
        historical = ?historical_bump,
        next = next.as_ref().map_or_else(|| "-".to_string(), ToString::to_string),
        "decision"
    );

    Ok(PackageDecision {
        package: name.to_string(),
        rel_dir: rel_dir.to_path_buf(),
        current: current.clone(),
        commit_bump,
        historical_bump,
        policy: effective,
        next,
        is_root,
    })
}

/// Read the sync policy's source version from the designated branch.
fn sync_source_version(
    git: &Git,
    config: &Config,
    flow: Option<&Flow>,
    rel_dir: &Utf8Path,
) -> Option<Version> {
    let source_branch = flow.and_then(|f| f.base.as_deref().or(f.to.as_deref()))?;
    let manifest_path = if rel_dir.as_str().is_empty() {
        Utf8PathBuf::from(&config.manifest.file)
    } else {
        rel_dir.join(&config.manifest.file)
    };
    let raw = git.show_file(source_branch, &manifest_path).ok()?;
    crate::manifest::Manifest::parse(&manifest_path, &raw)
        .ok()
        .map(|m| m.version())
}

impl RunPlan {
    /// Whether any package will change.
    pub fn has_changes(&self) -> bool {
        self.decisions.iter().any(|d| d.next.is_some())
    }

    /// Execute the plan: write manifests, commit, cascade, tag.
    ///
    /// A commit failure is fatal to that package's processing (recorded,
    /// cascade skipped) but the run continues with the remaining
    /// packages. Tag failures are logged and swallowed.
    #[instrument(skip_all, fields(branch = %self.branch))]
    pub fn execute(
        mut self,
        git: &Git,
        pm: &PackageManager,
        config: &Config,
    ) -> EngineResult<RunReport> {
        let mut report = RunReport::default();
        let decisions = self.decisions.clone();

        for decision in &decisions {
            let Some(next) = decision.next.clone() else {
                continue;
            };
            let kind = {
                let request = BumpRequest {
                    current: &decision.current,
                    commit_bump: decision.commit_bump,
                    historical_bump: decision.historical_bump,
                    sync_source: None,
                };
                policy::result_kind(decision.policy, &request, &next)
            };

            match self.apply_bump(git, config, decision, &next) {
                Ok(sha) => {
                    info!(package = %decision.package, version = %next, %kind, "bumped");
                    let result = BumpResult {
                        version: next.clone(),
                        kind,
                        sha: Some(sha),
                    };
                    if let Some(pkg) = self
                        .workspace
                        .packages
                        .iter_mut()
                        .find(|p| p.name == decision.package)
                    {
                        pkg.bump = Some(result.clone());
                    }
                    report.bumps.push(PackageBump {
                        package: decision.package.clone(),
                        result,
                    });
                }
                Err(e) => {
                    warn!(package = %decision.package, error = %e, "bump failed, skipping package");
                    report.errors.push(PackageError {
                        package: decision.package.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            // Members cascade into their dependents; the root has none.
            if !decision.is_root {
                self.run_cascade(git, pm, config, decision, &next, kind, &mut report);
            }
        }

        self.maybe_tag(git, config, &mut report);
        Ok(report)
    }

    /// Write and commit one package's new version. Returns the commit id.
    fn apply_bump(
        &mut self,
        git: &Git,
        config: &Config,
        decision: &PackageDecision,
        next: &Version,
    ) -> EngineResult<String> {
        let manifest = if decision.is_root {
            &mut self.workspace.root_manifest
        } else {
            &mut self
                .workspace
                .packages
                .iter_mut()
                .find(|p| p.name == decision.package)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!("unknown package '{}'", decision.package))
                })?
                .manifest
        };

        manifest.set_version(next);
        manifest.save()?;

        let rel_manifest = if decision.rel_dir.as_str().is_empty() {
            Utf8PathBuf::from(&self.manifest_file)
        } else {
            decision.rel_dir.join(&self.manifest_file)
        };
        let message = config
            .templates
            .render_version(&decision.package, &next.to_string());
        let sha = git.commit_paths(&[rel_manifest.as_path()], &message)?;
        Ok(sha)
    }

    /// Cascade one bump into dependents, saving and committing updates.
    #[allow(clippy::too_many_arguments)]
    fn run_cascade(
        &mut self,
        git: &Git,
        pm: &PackageManager,
        config: &Config,
        decision: &PackageDecision,
        next: &Version,
        kind: BumpKind,
        report: &mut RunReport,
    ) {
        let outcome = graph::cascade(
            &mut self.workspace.packages,
            &decision.package,
            next,
            kind,
            pm,
        );

        for update in &outcome.updates {
            let Some(pkg) = self
                .workspace
                .packages
                .iter()
                .find(|p| p.name == update.package)
            else {
                continue;
            };

            if let Err(e) = pkg.manifest.save() {
                warn!(package = %update.package, error = %e, "failed to save cascaded manifest");
                report.errors.push(PackageError {
                    package: update.package.clone(),
                    error: e.to_string(),
                });
                continue;
            }

            let rel_dir = pkg
                .dir
                .strip_prefix(&self.workspace.root)
                .unwrap_or(&pkg.dir);
            let rel_manifest = rel_dir.join(&self.manifest_file);
            let message = config.templates.render_dependency(
                &update.package,
                &update.dependency,
                &update.spec,
            );
            if let Err(e) = git.commit_paths(&[rel_manifest.as_path()], &message) {
                warn!(package = %update.package, error = %e, "failed to commit dependency update");
                report.errors.push(PackageError {
                    package: update.package.clone(),
                    error: e.to_string(),
                });
            }
        }

        report.dependency_updates.extend(outcome.updates);
        report.test_failures.extend(outcome.test_failures);
    }

    /// Tag the root version when branch rules and the flow allow it.
    ///
    /// Tagging is best-effort: failures are logged and swallowed.
    fn maybe_tag(&self, git: &Git, config: &Config, report: &mut RunReport) {
        let Some(root_bump) = report
            .bumps
            .iter()
            .find(|b| b.package == self.workspace.root_manifest.name())
        else {
            return;
        };

        let is_prerelease = !root_bump.result.version.pre.is_empty();
        let should_tag = if is_prerelease {
            self.flow.as_ref().is_some_and(Flow::tags_prereleases)
        } else {
            config
                .branch_rule(&self.branch)
                .map_or(true, |rule| rule.tags)
        };
        if !should_tag {
            debug!("tagging disabled for this branch/flow");
            return;
        }

        let tag = format!("v{}", root_bump.result.version);
        match git.tag(&tag, &format!("release {}", root_bump.result.version)) {
            Ok(()) => {
                info!(%tag, "tagged");
                report.tag = Some(tag);
            }
            Err(e) => {
                // Non-fatal by design: the bump commits already landed.
                warn!(%tag, error = %e, "tagging failed");
            }
        }
    }
}

/// Severity of the whole run, for display purposes.
#[must_use]
pub fn overall_severity(decisions: &[PackageDecision]) -> Option<BumpKind> {
    decisions
        .iter()
        .filter(|d| d.next.is_some())
        .fold(None, |acc, d| version::BumpKind::max_of(acc, d.commit_bump))
}
