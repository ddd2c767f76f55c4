//! Reference point discovery: the commit and version to diff against.
//!
//! Two top-level strategies, selected by whether the governing flow
//! configures a base branch:
//!
//! - **Tag-based** (no base branch): the highest semver tag reachable from
//!   HEAD, or the repository's first commit at 0.0.0 with a forced bump.
//! - **Branch-based**: a plan of three tactics run in order until one
//!   lands: merge-base against the base branch (with a lookback for
//!   rewritten history), the last commit that edited the manifest's
//!   version field, and a diff scan over commits touching the manifest.
//!
//! Discovery never aborts a run: total exhaustion falls back to the
//! earliest known commit at 0.0.0 with a forced bump, because version
//! bumping must always be able to produce some answer.

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::git::Git;
use crate::manifest::Manifest;
use crate::tactic::{self, Attempt, Merge, Tactic, TacticError};

/// The resolved reference point for one run.
#[derive(Debug, Clone, Serialize)]
pub struct ReferencePoint {
    /// The commit to diff from, `None` only in an empty repository.
    pub commit: Option<String>,
    /// The version the manifest carried at that commit.
    pub version: Version,
    /// Whether this run should finalize prerelease versions.
    pub finalize: bool,
    /// Whether a bump must be produced even without qualifying commits.
    pub force_bump: bool,
}

/// Inputs to branch-based discovery.
pub struct DiscoveryContext<'a> {
    /// The VCS collaborator.
    pub git: &'a Git,
    /// Repo-relative path of the manifest whose history is consulted.
    pub manifest_path: Utf8PathBuf,
    /// The configured base branch, when the flow names one.
    pub base_branch: Option<String>,
    /// The branch currently checked out.
    pub current_branch: String,
    /// The branch the run operates on (normally the current one).
    pub active_branch: String,
    /// How many recent commits to pair against the base when a plain
    /// merge-base fails (tolerates force-pushed history).
    pub lookback: usize,
    /// Upper bound on history scans for the version-field tactics.
    pub max_scan: usize,
}

impl Merge for DiscoveryContext<'_> {
    type Patch = ();

    fn merged(self, (): ()) -> Self {
        self
    }
}

impl DiscoveryContext<'_> {
    /// Flag pair shared by every branch-based tactic.
    ///
    /// On the base branch itself the run finalizes; anywhere else it
    /// forces a bump so feature and release branches always move forward.
    fn flags(&self) -> (bool, bool) {
        let base = self.base_branch.as_deref().unwrap_or_default();
        let finalize = self.current_branch == base;
        let force = !finalize && self.active_branch != base;
        (finalize, force)
    }

    /// Read the manifest version as of `commit`, defaulting to 0.0.0 when
    /// the file is unreadable there.
    fn version_at(&self, commit: &str) -> Version {
        match self.git.show_file(commit, &self.manifest_path) {
            Ok(raw) => Manifest::parse(&self.manifest_path, &raw)
                .map(|m| m.version())
                .unwrap_or_else(|_| Version::new(0, 0, 0)),
            Err(_) => Version::new(0, 0, 0),
        }
    }

    fn point(&self, commit: String) -> ReferencePoint {
        let version = self.version_at(&commit);
        let (finalize, force_bump) = self.flags();
        ReferencePoint {
            commit: Some(commit),
            version,
            finalize,
            force_bump,
        }
    }
}

/// Discover the reference point for this run.
///
/// Never fails: exhaustion of every tactic degrades to the first-commit
/// fallback.
#[instrument(skip(ctx), fields(base = ctx.base_branch.as_deref().unwrap_or("-")))]
pub fn discover(ctx: DiscoveryContext<'_>) -> ReferencePoint {
    // The fallback only needs the collaborator, which outlives the
    // context consumed by the plan.
    let git = ctx.git;

    if ctx.base_branch.is_none() {
        return tag_based(&ctx);
    }

    let merge_base = MergeBase;
    let last_version = LastVersionCommit;
    let diff_scan = DiffBasedVersionCommit;
    let plan = tactic::Plan::new(
        "reference-discovery",
        vec![&merge_base as &dyn Tactic<_, _>, &last_version, &diff_scan],
    );

    match plan.run(ctx) {
        Ok((point, _ctx)) => point,
        Err(e) => {
            warn!(error = %e, "discovery exhausted, falling back to first commit at 0.0.0");
            first_commit_fallback(git)
        }
    }
}

/// Tag-based discovery: highest reachable semver tag, else first commit.
fn tag_based(ctx: &DiscoveryContext<'_>) -> ReferencePoint {
    let best = ctx
        .git
        .reachable_tags()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tag| {
            let stripped = tag.strip_prefix('v').unwrap_or(&tag);
            Version::parse(stripped).ok().map(|v| (v, tag))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b));

    if let Some((version, tag)) = best {
        debug!(%tag, %version, "tag-based reference");
        let commit = ctx.git.rev_parse(&tag).ok();
        return ReferencePoint {
            commit,
            version,
            finalize: false,
            force_bump: false,
        };
    }

    debug!("no semver tags reachable, using first commit");
    first_commit_fallback(ctx.git)
}

/// The last-resort reference: the repository's first commit at 0.0.0.
///
/// There is no prior release to compare against, so any qualifying commit
/// must produce a version: `force_bump` is always set.
fn first_commit_fallback(git: &Git) -> ReferencePoint {
    let commit = git.first_commit().unwrap_or_default();
    ReferencePoint {
        commit,
        version: Version::new(0, 0, 0),
        finalize: false,
        force_bump: true,
    }
}

// ──────────────────────────────────────────────
// Tactics
// ──────────────────────────────────────────────

/// Merge-base against the configured base branch, with lookback.
struct MergeBase;

impl<'a> Tactic<DiscoveryContext<'a>, ReferencePoint> for MergeBase {
    fn name(&self) -> &str {
        "merge-base"
    }

    fn assess(&self, ctx: &DiscoveryContext<'a>) -> bool {
        ctx.base_branch.is_some()
    }

    fn attempt(
        &self,
        ctx: &DiscoveryContext<'a>,
    ) -> Result<Attempt<ReferencePoint, ()>, TacticError> {
        let Some(base) = ctx.base_branch.as_deref() else {
            return Ok(Attempt::not_applicable("no base branch configured"));
        };

        // Prefer the local ref; fetch from origin when unknown.
        let base_ref = if ctx.git.has_rev(base) {
            base.to_string()
        } else {
            ctx.git.fetch_branch("origin", base)?;
            let remote = format!("origin/{base}");
            if !ctx.git.has_rev(&remote) {
                return Ok(Attempt::failure(format!(
                    "base branch '{base}' not found locally or on origin"
                )));
            }
            remote
        };

        if let Some(commit) = ctx.git.merge_base(&base_ref, "HEAD")? {
            return Ok(Attempt::success(
                ctx.point(commit.clone()),
                format!("merge-base with '{base_ref}' at {commit}"),
            ));
        }

        // No direct ancestor: pair the base against recent commits to
        // tolerate force-pushed or rewritten history. A merge-base equal
        // to the probed commit proves nothing, so keep scanning.
        debug!(lookback = ctx.lookback, "plain merge-base failed, scanning lookback");
        for sha in ctx.git.recent_shas(ctx.lookback)? {
            if let Some(commit) = ctx.git.merge_base(&base_ref, &sha)?
                && commit != sha
            {
                return Ok(Attempt::success(
                    ctx.point(commit.clone()),
                    format!("lookback merge-base via {sha}"),
                ));
            }
        }

        Ok(Attempt::failure(format!(
            "no common ancestor with '{base_ref}' within {} commits",
            ctx.lookback
        )))
    }
}

/// The most recent commit that edited the manifest's version field.
struct LastVersionCommit;

impl<'a> Tactic<DiscoveryContext<'a>, ReferencePoint> for LastVersionCommit {
    fn name(&self) -> &str {
        "last-version-commit"
    }

    fn assess(&self, _ctx: &DiscoveryContext<'a>) -> bool {
        true
    }

    fn attempt(
        &self,
        ctx: &DiscoveryContext<'a>,
    ) -> Result<Attempt<ReferencePoint, ()>, TacticError> {
        let commits = ctx
            .git
            .version_field_commits(&ctx.manifest_path, ctx.max_scan)?;

        match commits.first() {
            Some(commit) => Ok(Attempt::success(
                ctx.point(commit.clone()),
                format!("version field last changed in {commit}"),
            )),
            None => Ok(Attempt::failure("no commit ever changed the version field")),
        }
    }
}

/// Diff scan over commits touching the manifest, newest first.
///
/// Slower than the line-tracking query but survives manifests whose
/// version line moved around.
struct DiffBasedVersionCommit;

impl<'a> Tactic<DiscoveryContext<'a>, ReferencePoint> for DiffBasedVersionCommit {
    fn name(&self) -> &str {
        "diff-version-scan"
    }

    fn assess(&self, _ctx: &DiscoveryContext<'a>) -> bool {
        true
    }

    fn attempt(
        &self,
        ctx: &DiscoveryContext<'a>,
    ) -> Result<Attempt<ReferencePoint, ()>, TacticError> {
        let touching = ctx
            .git
            .commits_touching(&ctx.manifest_path, ctx.max_scan)?;

        for commit in &touching {
            let diff = match ctx.git.diff_of_commit(commit, &ctx.manifest_path) {
                Ok(d) => d,
                Err(e) => {
                    debug!(%commit, error = %e, "diff unavailable, skipping");
                    continue;
                }
            };
            if diff_changes_version(&diff) {
                return Ok(Attempt::success(
                    ctx.point(commit.clone()),
                    format!("version change found in diff of {commit}"),
                ));
            }
        }

        Ok(Attempt::failure(format!(
            "no version change in the last {} commits touching {}",
            touching.len(),
            ctx.manifest_path
        )))
    }
}

/// Whether a unified diff adds or removes a version field line.
fn diff_changes_version(diff: &str) -> bool {
    diff.lines().any(|line| {
        let changed = (line.starts_with('+') && !line.starts_with("+++"))
            || (line.starts_with('-') && !line.starts_with("---"));
        changed && line[1..].trim_start().starts_with("\"version\"")
    })
}

/// Convenience constructor for common discovery runs.
impl<'a> DiscoveryContext<'a> {
    /// Build a context with the default lookback and scan bounds.
    pub fn new(
        git: &'a Git,
        manifest_path: impl AsRef<Utf8Path>,
        base_branch: Option<String>,
        current_branch: impl Into<String>,
    ) -> Self {
        let current = current_branch.into();
        Self {
            git,
            manifest_path: manifest_path.as_ref().to_path_buf(),
            base_branch,
            active_branch: current.clone(),
            current_branch: current,
            lookback: 20,
            max_scan: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use tempfile::TempDir;

    fn run(root: &Utf8Path, args: &[&str]) -> Option<()> {
        Command::new("git")
            .args(args)
            .current_dir(root.as_std_path())
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|_| ())
    }

    fn write_manifest(root: &Utf8Path, version: &str) {
        fs::write(
            root.join("package.json"),
            format!("{{\n  \"name\": \"root\",\n  \"version\": \"{version}\"\n}}\n"),
        )
        .unwrap();
    }

    fn scratch_repo() -> Option<(TempDir, Git)> {
        let tmp = TempDir::new().ok()?;
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).ok()?;
        run(&root, &["init", "--quiet", "-b", "main"])?;
        run(&root, &["config", "user.email", "test@example.com"])?;
        run(&root, &["config", "user.name", "Test"])?;
        write_manifest(&root, "1.0.0");
        run(&root, &["add", "."])?;
        run(&root, &["commit", "--quiet", "-m", "feat: initial import"])?;
        Some((tmp, Git::new(root)))
    }

    fn ctx<'a>(git: &'a Git, base: Option<&str>) -> DiscoveryContext<'a> {
        DiscoveryContext::new(
            git,
            "package.json",
            base.map(ToOwned::to_owned),
            "main",
        )
    }

    #[test]
    fn diff_detects_version_lines() {
        let diff = "--- a/package.json\n+++ b/package.json\n-  \"version\": \"1.0.0\",\n+  \"version\": \"1.1.0\",\n";
        assert!(diff_changes_version(diff));

        let diff = "--- a/package.json\n+++ b/package.json\n+  \"description\": \"x\",\n";
        assert!(!diff_changes_version(diff));
    }

    #[test]
    fn tag_based_picks_highest_semver_tag() {
        let Some((_tmp, git)) = scratch_repo() else {
            return;
        };
        git.tag("v0.9.0", "old").unwrap();
        git.tag("v1.2.0", "newer").unwrap();
        git.tag("not-a-version", "junk").unwrap();

        let point = discover(ctx(&git, None));
        assert_eq!(point.version, Version::new(1, 2, 0));
        assert!(point.commit.is_some());
        assert!(!point.force_bump);
        assert!(!point.finalize);
    }

    #[test]
    fn tag_based_without_tags_forces_bump() {
        let Some((_tmp, git)) = scratch_repo() else {
            return;
        };
        let point = discover(ctx(&git, None));
        assert_eq!(point.version, Version::new(0, 0, 0));
        assert!(point.force_bump);
        assert!(point.commit.is_some());
    }

    #[test]
    fn empty_repo_still_produces_reference() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let Ok(root) = Utf8PathBuf::try_from(tmp.path().to_path_buf()) else {
            return;
        };
        if run(&root, &["init", "--quiet", "-b", "main"]).is_none() {
            return;
        }
        let git = Git::new(&root);

        let point = discover(ctx(&git, None));
        assert_eq!(point.version, Version::new(0, 0, 0));
        assert!(point.force_bump);
        assert!(point.commit.is_none());
    }

    #[test]
    fn merge_base_on_feature_branch_forces_bump() {
        let Some((_tmp, git)) = scratch_repo() else {
            return;
        };
        let root = git.root().to_path_buf();
        run(&root, &["checkout", "--quiet", "-b", "feature/x"]).unwrap();
        fs::write(root.join("extra.txt"), "x\n").unwrap();
        run(&root, &["add", "."]).unwrap();
        run(&root, &["commit", "--quiet", "-m", "feat: work"]).unwrap();

        let mut c = ctx(&git, Some("main"));
        c.current_branch = "feature/x".into();
        c.active_branch = "feature/x".into();
        let point = discover(c);

        assert!(point.commit.is_some());
        assert_eq!(point.version, Version::new(1, 0, 0));
        assert!(!point.finalize);
        assert!(point.force_bump);
    }

    #[test]
    fn merge_base_on_base_branch_finalizes() {
        let Some((_tmp, git)) = scratch_repo() else {
            return;
        };
        let point = discover(ctx(&git, Some("main")));
        assert!(point.finalize);
        assert!(!point.force_bump);
    }

    #[test]
    fn last_version_commit_finds_latest_edit() {
        let Some((_tmp, git)) = scratch_repo() else {
            return;
        };
        let root = git.root().to_path_buf();
        write_manifest(&root, "1.1.0");
        run(&root, &["add", "."]).unwrap();
        run(&root, &["commit", "--quiet", "-m", "chore: release 1.1.0"]).unwrap();
        fs::write(root.join("other.txt"), "x\n").unwrap();
        run(&root, &["add", "."]).unwrap();
        run(&root, &["commit", "--quiet", "-m", "docs: note"]).unwrap();

        let c = ctx(&git, None);
        let attempt = LastVersionCommit.attempt(&c).unwrap();
        assert!(attempt.success);
        let point = attempt.value.unwrap();
        assert_eq!(point.version, Version::new(1, 1, 0));
    }

    #[test]
    fn diff_scan_finds_version_commit() {
        let Some((_tmp, git)) = scratch_repo() else {
            return;
        };
        let root = git.root().to_path_buf();
        write_manifest(&root, "2.0.0");
        run(&root, &["add", "."]).unwrap();
        run(&root, &["commit", "--quiet", "-m", "chore: release 2.0.0"]).unwrap();

        let c = ctx(&git, None);
        let attempt = DiffBasedVersionCommit.attempt(&c).unwrap();
        assert!(attempt.success);
        let point = attempt.value.unwrap();
        assert_eq!(point.version, Version::new(2, 0, 0));
    }

    #[test]
    fn merge_base_skipped_without_base() {
        let Some((_tmp, git)) = scratch_repo() else {
            return;
        };
        let c = ctx(&git, None);
        assert!(!MergeBase.assess(&c));
    }
}
