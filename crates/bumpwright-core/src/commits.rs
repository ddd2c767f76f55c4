//! Commit classification: raw log entries to structured info and a severity.
//!
//! Two tactics run under `one` semantics: a strict conventional-commit
//! parser, and a heuristic fallback that only engages when the strict pass
//! yields zero usable commits. The heuristic regex-matches the same header
//! shape and otherwise guesses a type from keywords.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::tactic::{self, Attempt, ManeuverResult, Merge, Tactic, TacticError};
use crate::version::BumpKind;

/// A raw log entry as produced by the VCS collaborator.
#[derive(Debug, Clone)]
pub struct RawCommit {
    /// Full commit id.
    pub sha: String,
    /// First line of the message.
    pub header: String,
    /// Remaining message body (may be empty).
    pub body: String,
}

/// Structured information extracted from one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// Conventional type (`feat`, `fix`, ...), when one was recognized.
    pub kind: Option<String>,
    /// Scope inside the parentheses, when present.
    pub scope: Option<String>,
    /// Subject text after the colon.
    pub subject: Option<String>,
    /// Whether this commit is a breaking change.
    pub breaking: bool,
    /// The original header line.
    pub header: Option<String>,
}

/// The classifier's output for one commit set.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Structured records, one per classified commit.
    pub commits: Vec<CommitInfo>,
    /// Aggregate severity of the whole set (`None` for an empty set).
    pub severity: Option<BumpKind>,
}

/// Reduce a commit set to its aggregate severity.
///
/// Any breaking commit short-circuits to major. Otherwise any `feat` means
/// minor, any commit at all means patch, and an empty set means `None`.
/// The reduction is order-insensitive.
pub fn aggregate_severity(commits: &[CommitInfo]) -> Option<BumpKind> {
    if commits.is_empty() {
        return None;
    }
    if commits.iter().any(|c| c.breaking) {
        return Some(BumpKind::Major);
    }
    if commits.iter().any(|c| c.kind.as_deref() == Some("feat")) {
        return Some(BumpKind::Minor);
    }
    Some(BumpKind::Patch)
}

/// Classify a set of raw log entries.
///
/// `since` excludes the entry carrying that commit id (the reference point
/// itself must not count toward the next bump).
pub fn classify(entries: &[RawCommit], since: Option<&str>) -> ManeuverResult<Classification> {
    let kept: Vec<RawCommit> = entries
        .iter()
        .filter(|e| since != Some(e.sha.as_str()))
        .cloned()
        .collect();
    debug!(
        total = entries.len(),
        kept = kept.len(),
        "classifying commits"
    );

    let ctx = ClassifyCtx { entries: kept };
    let strict = StrictParse;
    let heuristic = HeuristicParse;
    let (classification, _ctx) =
        tactic::one("classify-commits", &[&strict as &dyn Tactic<_, _>, &heuristic], ctx)?;
    Ok(classification)
}

/// Context shared by the classifier tactics.
struct ClassifyCtx {
    entries: Vec<RawCommit>,
}

impl Merge for ClassifyCtx {
    type Patch = ();

    fn merged(self, (): ()) -> Self {
        self
    }
}

// ──────────────────────────────────────────────
// Strict parser
// ──────────────────────────────────────────────

struct StrictParse;

impl Tactic<ClassifyCtx, Classification> for StrictParse {
    fn name(&self) -> &str {
        "strict-parse"
    }

    fn assess(&self, _ctx: &ClassifyCtx) -> bool {
        true
    }

    fn attempt(
        &self,
        ctx: &ClassifyCtx,
    ) -> Result<Attempt<Classification, ()>, TacticError> {
        let commits: Vec<CommitInfo> = ctx
            .entries
            .iter()
            .filter_map(|e| parse_conventional(&e.header, &e.body))
            .collect();

        if commits.is_empty() {
            return Ok(Attempt::failure("no conventional commit headers found"));
        }

        let severity = aggregate_severity(&commits);
        let message = format!("parsed {} conventional commits", commits.len());
        Ok(Attempt::success(Classification { commits, severity }, message))
    }
}

/// Parse a `type(scope): subject` header with optional `!` marker.
///
/// Returns `None` when the header does not follow the conventional shape.
fn parse_conventional(header: &str, body: &str) -> Option<CommitInfo> {
    let (prefix, subject) = header.split_once(':')?;
    let prefix = prefix.trim();
    let bang = prefix.ends_with('!');
    let prefix = prefix.strip_suffix('!').unwrap_or(prefix);

    let (kind, scope) = match prefix.split_once('(') {
        Some((kind, rest)) => (kind, Some(rest.strip_suffix(')')?)),
        None => (prefix, None),
    };

    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if let Some(s) = scope
        && s.is_empty()
    {
        return None;
    }

    Some(CommitInfo {
        kind: Some(kind.to_ascii_lowercase()),
        scope: scope.map(ToOwned::to_owned),
        subject: Some(subject.trim().to_owned()),
        breaking: bang || has_breaking_footer(body),
        header: Some(header.to_owned()),
    })
}

fn has_breaking_footer(body: &str) -> bool {
    body.contains("BREAKING CHANGE:") || body.contains("BREAKING-CHANGE:")
}

// ──────────────────────────────────────────────
// Heuristic fallback
// ──────────────────────────────────────────────

static HEADER_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)(?:\(([^)]*)\))?(!)?:\s*(.*)$").expect("hardcoded pattern is valid")
});

struct HeuristicParse;

impl Tactic<ClassifyCtx, Classification> for HeuristicParse {
    fn name(&self) -> &str {
        "heuristic-parse"
    }

    fn assess(&self, _ctx: &ClassifyCtx) -> bool {
        true
    }

    fn attempt(
        &self,
        ctx: &ClassifyCtx,
    ) -> Result<Attempt<Classification, ()>, TacticError> {
        let commits: Vec<CommitInfo> = ctx.entries.iter().map(guess_commit).collect();
        let severity = aggregate_severity(&commits);
        let message = format!("classified {} commits heuristically", commits.len());
        Ok(Attempt::success(Classification { commits, severity }, message))
    }
}

/// Best-effort classification when headers are not conventional.
fn guess_commit(entry: &RawCommit) -> CommitInfo {
    let header = entry.header.as_str();

    if let Some(caps) = HEADER_SHAPE.captures(header) {
        let kind = caps.get(1).map(|m| m.as_str().to_ascii_lowercase());
        let scope = caps.get(2).map(|m| m.as_str().to_owned());
        let subject = caps.get(4).map(|m| m.as_str().trim().to_owned());
        let bang = caps.get(3).is_some();
        return CommitInfo {
            kind,
            scope,
            subject,
            breaking: bang || sounds_breaking(entry),
            header: Some(header.to_owned()),
        };
    }

    CommitInfo {
        kind: guess_kind(header),
        scope: None,
        subject: Some(header.trim().to_owned()),
        breaking: sounds_breaking(entry),
        header: Some(header.to_owned()),
    }
}

/// Keyword-based type guess for free-form headers.
fn guess_kind(header: &str) -> Option<String> {
    let lower = header.to_ascii_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["fix", "bug", "patch"]) {
        return Some("fix".to_owned());
    }
    if has(&["feat", "feature", "add"]) {
        return Some("feat".to_owned());
    }
    if has(&["chore", "refactor", "docs", "style", "test"]) {
        return Some("chore".to_owned());
    }
    None
}

/// "breaking"/"major" anywhere, or a `!:` marker in the header.
fn sounds_breaking(entry: &RawCommit) -> bool {
    let text = format!("{}\n{}", entry.header, entry.body).to_ascii_lowercase();
    text.contains("breaking") || text.contains("major") || entry.header.contains("!:")
}
