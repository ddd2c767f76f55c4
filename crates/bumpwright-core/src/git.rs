//! Git operations for bump workflows.
//!
//! Shells out to `git` for all operations. This ensures we inherit the
//! user's SSH keys, GPG signing, hooks, and other configuration. Every
//! caller holds an explicit [`Git`] instance bound to a repository root;
//! there is no process-global handle.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::commits::RawCommit;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "log").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Field and record separators for parsing multi-field log output.
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// A git collaborator bound to one repository checkout.
#[derive(Debug, Clone)]
pub struct Git {
    root: Utf8PathBuf,
}

impl Git {
    /// Create a collaborator rooted at `root`.
    pub fn new(root: impl AsRef<Utf8Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The repository root this instance operates on.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Check if the root is inside a git work tree.
    #[instrument(skip(self))]
    pub fn is_inside_repo(&self) -> GitResult<bool> {
        match self.git(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => Ok(output.trim() == "true"),
            Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get the current branch name, `None` in detached HEAD state.
    #[instrument(skip(self))]
    pub fn current_branch(&self) -> GitResult<Option<String>> {
        let output = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = output.trim().to_string();
        if branch == "HEAD" {
            debug!("detached HEAD");
            Ok(None)
        } else {
            Ok(Some(branch))
        }
    }

    /// Resolve a revision to a full commit id.
    pub fn rev_parse(&self, rev: &str) -> GitResult<String> {
        let output = self.git(&["rev-parse", "--verify", &format!("{rev}^{{commit}}")])?;
        Ok(output.trim().to_string())
    }

    /// Whether a revision resolves at all.
    pub fn has_rev(&self, rev: &str) -> bool {
        self.rev_parse(rev).is_ok()
    }

    /// The common ancestor of two revisions, `None` when they share none.
    #[instrument(skip(self))]
    pub fn merge_base(&self, a: &str, b: &str) -> GitResult<Option<String>> {
        match self.git(&["merge-base", a, b]) {
            Ok(output) => Ok(Some(output.trim().to_string())),
            Err(GitError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch one branch from a remote (quietly).
    #[instrument(skip(self))]
    pub fn fetch_branch(&self, remote: &str, branch: &str) -> GitResult<()> {
        self.git(&["fetch", "--quiet", remote, branch])?;
        Ok(())
    }

    /// The most recent commit ids on HEAD, newest first.
    pub fn recent_shas(&self, limit: usize) -> GitResult<Vec<String>> {
        let output = self.git(&["rev-list", &format!("--max-count={limit}"), "HEAD"])?;
        Ok(output.lines().map(|l| l.trim().to_string()).collect())
    }

    /// The repository's very first commit, `None` for an empty repository.
    #[instrument(skip(self))]
    pub fn first_commit(&self) -> GitResult<Option<String>> {
        match self.git(&["rev-list", "--max-parents=0", "HEAD"]) {
            Ok(output) => Ok(output.lines().last().map(|l| l.trim().to_string())),
            // An unborn branch has no rev-list at all.
            Err(GitError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// All tags reachable from HEAD.
    pub fn reachable_tags(&self) -> GitResult<Vec<String>> {
        let output = self.git(&["tag", "--merged", "HEAD"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    /// Structured log entries for a range, optionally limited to one
    /// directory. `since` of `None` means the whole history of HEAD.
    #[instrument(skip(self))]
    pub fn log_entries(
        &self,
        since: Option<&str>,
        dir: Option<&Utf8Path>,
        limit: usize,
    ) -> GitResult<Vec<RawCommit>> {
        let range = since.map_or_else(|| "HEAD".to_string(), |s| format!("{s}..HEAD"));
        let format = format!("--format=%H{FIELD_SEP}%s{FIELD_SEP}%b{RECORD_SEP}");
        let max = format!("--max-count={limit}");

        let mut args = vec!["log", range.as_str(), max.as_str(), format.as_str()];
        if let Some(dir) = dir {
            args.push("--");
            args.push(dir.as_str());
        }

        let output = self.git(&args)?;
        let commits = output
            .split(RECORD_SEP)
            .filter_map(|record| {
                let record = record.trim_start_matches(['\n', '\r']);
                let mut fields = record.split(FIELD_SEP);
                let sha = fields.next()?.trim().to_string();
                if sha.is_empty() {
                    return None;
                }
                let header = fields.next().unwrap_or_default().trim().to_string();
                let body = fields.next().unwrap_or_default().trim().to_string();
                Some(RawCommit { sha, header, body })
            })
            .collect();
        Ok(commits)
    }

    /// Commits that changed the version line of `file`, newest first.
    ///
    /// Uses git's line-tracking log (`-L`) so only actual version-field
    /// edits count, bounded by `limit`.
    #[instrument(skip(self))]
    pub fn version_field_commits(&self, file: &Utf8Path, limit: usize) -> GitResult<Vec<String>> {
        let track = format!("-L/\"version\"/,+1:{file}");
        let max = format!("--max-count={limit}");
        let output = self.git(&["log", "-s", "--format=%H", &max, &track])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    /// Commits that touched `file` at all, newest first.
    pub fn commits_touching(&self, file: &Utf8Path, limit: usize) -> GitResult<Vec<String>> {
        let max = format!("--max-count={limit}");
        let output = self.git(&["log", "--format=%H", &max, "--", file.as_str()])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    /// The content of `path` as it existed at `rev`.
    pub fn show_file(&self, rev: &str, path: &Utf8Path) -> GitResult<String> {
        self.git(&["show", &format!("{rev}:{path}")])
    }

    /// The unified diff a single commit applied to `path`.
    pub fn diff_of_commit(&self, rev: &str, path: &Utf8Path) -> GitResult<String> {
        self.git(&["show", "--format=", "--unified=0", rev, "--", path.as_str()])
    }

    /// Stage the given paths and create a commit. Returns the new commit id.
    #[instrument(skip(self, paths))]
    pub fn commit_paths(&self, paths: &[&Utf8Path], message: &str) -> GitResult<String> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(|p| p.as_str()));
        self.git(&args)?;
        self.git(&["commit", "--quiet", "-m", message])?;
        let sha = self.git(&["rev-parse", "HEAD"])?;
        Ok(sha.trim().to_string())
    }

    /// Create an annotated tag at HEAD.
    #[instrument(skip(self))]
    pub fn tag(&self, name: &str, message: &str) -> GitResult<()> {
        self.git(&["tag", "-a", name, "-m", message])?;
        Ok(())
    }

    /// Run a git command in the repository root and return its stdout.
    fn git(&self, args: &[&str]) -> GitResult<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.root.as_std_path())
            .output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

            // Detect "not a git repo" specifically
            if stderr.contains("not a git repository") {
                return Err(GitError::NotARepo);
            }

            Err(GitError::Command {
                command: args.first().unwrap_or(&"").to_string(),
                stderr,
            })
        }
    }
}
