//! Branch flow matching: which configured flow governs this branch.
//!
//! A flow maps a branch-name pattern to a versioning policy and a base
//! branch. Matching uses a minimal anchored `*` wildcard, scored by
//! specificity; ties keep configuration order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::policy::Policy;

/// Versioning mode named by a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Versioning {
    /// Produce prerelease versions on this flow.
    PreRelease,
    /// Finalize prerelease versions into stable ones.
    Finalize,
}

/// One configured flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flow {
    /// Display name for logs and reports.
    pub name: String,
    /// Branch pattern this flow applies to (exact, `*`, or glob).
    pub from: String,
    /// Target branch or pattern, when the flow moves work somewhere.
    pub to: Option<String>,
    /// Base branch used for reference-point discovery.
    pub base: Option<String>,
    /// Versioning mode; absent means sync/do-nothing (see [`Flow::policy`]).
    pub versioning: Option<Versioning>,
    /// Whether versions produced on this flow are tagged.
    pub tags: Option<bool>,
    /// Branch patterns explicitly excluded from `from`.
    #[serde(rename = "from-exclude")]
    pub from_exclude: Vec<String>,
    /// Whether this flow is driven by an external trigger.
    pub triggered: Option<bool>,
}

impl Default for Flow {
    fn default() -> Self {
        Self {
            name: String::new(),
            from: "*".to_string(),
            to: None,
            base: None,
            versioning: None,
            tags: None,
            from_exclude: Vec::new(),
            triggered: None,
        }
    }
}

impl Flow {
    /// The policy this flow selects.
    ///
    /// `versioning` wins when present; a flow that maps `from` to an
    /// explicit `to` without versioning mirrors versions (sync); anything
    /// else decides nothing on its own.
    pub fn policy(&self) -> Policy {
        match self.versioning {
            Some(Versioning::PreRelease) => Policy::PreRelease,
            Some(Versioning::Finalize) => Policy::Finalize,
            None if self.to.is_some() => Policy::Sync,
            None => Policy::DoNothing,
        }
    }

    /// Whether prerelease versions on this flow get tags.
    pub fn tags_prereleases(&self) -> bool {
        self.tags.unwrap_or(false)
    }

    /// Whether the flow requires creating its target branch.
    pub fn requires_branch_creation(&self) -> bool {
        self.to.as_deref().is_some_and(|to| to != self.from)
    }
}

/// Match `name` against an anchored pattern where `*` matches any run of
/// characters (including separators).
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    // Iterative wildcard match with single-star backtracking.
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Specificity score for a flow against a branch, `None` when it does not
/// match or is excluded.
fn score(flow: &Flow, branch: &str) -> Option<u32> {
    if flow.from_exclude.iter().any(|p| pattern_matches(p, branch)) {
        return None;
    }
    if !pattern_matches(&flow.from, branch) {
        return None;
    }

    let mut score = if flow.from == branch {
        100
    } else if flow.from == "*" {
        10
    } else {
        50
    };
    if flow.versioning.is_some() {
        score += 5;
    }
    if flow.base.is_some() {
        score += 3;
    }
    Some(score)
}

/// Select the best-matching flow for the active branch.
///
/// Highest specificity wins; equal scores keep the earlier flow. Returns
/// `None` when no flow matches at all.
pub fn match_flow<'a>(flows: &'a [Flow], branch: &str) -> Option<&'a Flow> {
    let mut best: Option<(&Flow, u32)> = None;

    for flow in flows {
        let Some(s) = score(flow, branch) else {
            continue;
        };
        debug!(flow = %flow.name, score = s, "flow matches branch");
        // Strictly greater keeps the first flow on ties.
        if best.is_none_or(|(_, b)| s > b) {
            best = Some((flow, s));
        }
    }

    best.map(|(flow, _)| flow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(name: &str, from: &str) -> Flow {
        Flow {
            name: name.into(),
            from: from.into(),
            ..Flow::default()
        }
    }

    #[test]
    fn pattern_exact() {
        assert!(pattern_matches("main", "main"));
        assert!(!pattern_matches("main", "maintenance"));
        assert!(!pattern_matches("main", "ma"));
    }

    #[test]
    fn pattern_bare_star() {
        assert!(pattern_matches("*", "anything/at/all"));
        assert!(pattern_matches("*", ""));
    }

    #[test]
    fn pattern_glob_is_anchored() {
        assert!(pattern_matches("feature/*", "feature/login"));
        assert!(pattern_matches("feature/*", "feature/deep/nesting"));
        assert!(!pattern_matches("feature/*", "release/feature/x"));
        assert!(pattern_matches("release-*-hotfix", "release-1.2-hotfix"));
        assert!(!pattern_matches("release-*-hotfix", "release-1.2"));
    }

    #[test]
    fn exact_outranks_wildcard_regardless_of_order() {
        let flows = vec![flow("wild", "feature/*"), flow("main", "main")];
        let selected = match_flow(&flows, "main").unwrap();
        assert_eq!(selected.name, "main");

        let reordered = vec![flow("main", "main"), flow("wild", "*")];
        let selected = match_flow(&reordered, "main").unwrap();
        assert_eq!(selected.name, "main");
    }

    #[test]
    fn explicit_pattern_outranks_bare_wildcard() {
        let flows = vec![flow("any", "*"), flow("features", "feature/*")];
        let selected = match_flow(&flows, "feature/x").unwrap();
        assert_eq!(selected.name, "features");
    }

    #[test]
    fn versioning_and_base_add_weight() {
        let plain = flow("plain", "release/*");
        let mut weighted = flow("weighted", "release/*");
        weighted.versioning = Some(Versioning::PreRelease);
        weighted.base = Some("main".into());

        let flows = vec![plain, weighted];
        let selected = match_flow(&flows, "release/1.2").unwrap();
        assert_eq!(selected.name, "weighted");
    }

    #[test]
    fn ties_keep_configuration_order() {
        let flows = vec![flow("first", "feature/*"), flow("second", "feature/*")];
        let selected = match_flow(&flows, "feature/x").unwrap();
        assert_eq!(selected.name, "first");
    }

    #[test]
    fn exclusion_removes_match() {
        let mut f = flow("features", "feature/*");
        f.from_exclude = vec!["feature/wip-*".into()];
        let flows = vec![f, flow("fallback", "*")];

        let selected = match_flow(&flows, "feature/wip-test").unwrap();
        assert_eq!(selected.name, "fallback");
        let selected = match_flow(&flows, "feature/done").unwrap();
        assert_eq!(selected.name, "features");
    }

    #[test]
    fn no_match_is_none() {
        let flows = vec![flow("main", "main")];
        assert!(match_flow(&flows, "feature/x").is_none());
    }

    #[test]
    fn policy_derivation() {
        let mut f = flow("pre", "release/*");
        f.versioning = Some(Versioning::PreRelease);
        assert_eq!(f.policy(), Policy::PreRelease);

        f.versioning = Some(Versioning::Finalize);
        assert_eq!(f.policy(), Policy::Finalize);

        f.versioning = None;
        f.to = Some("main".into());
        assert_eq!(f.policy(), Policy::Sync);

        f.to = None;
        assert_eq!(f.policy(), Policy::DoNothing);
    }

    #[test]
    fn branch_creation_required_when_target_differs() {
        let mut f = flow("promote", "develop");
        assert!(!f.requires_branch_creation());
        f.to = Some("main".into());
        assert!(f.requires_branch_creation());
        f.to = Some("develop".into());
        assert!(!f.requires_branch_creation());
    }

    #[test]
    fn serde_kebab_case_versioning() {
        let json = r#"{"name": "rel", "from": "release/*", "versioning": "pre-release"}"#;
        let f: Flow = serde_json::from_str(json).unwrap();
        assert_eq!(f.versioning, Some(Versioning::PreRelease));

        let json = r#"{"name": "main", "from": "main", "versioning": "finalize"}"#;
        let f: Flow = serde_json::from_str(json).unwrap();
        assert_eq!(f.versioning, Some(Versioning::Finalize));
    }
}
