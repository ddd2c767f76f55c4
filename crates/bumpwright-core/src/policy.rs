//! The version-bump policy engine.
//!
//! Pure functions from (current version, commit severity, historical
//! severity, policy) to a next version or a no-op. The policy set is a
//! closed enum dispatched through one `match`; nothing is looked up at
//! runtime.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::version::{self, BumpKind};

/// The closed set of bump policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Never change the version.
    DoNothing,
    /// Apply the commit-derived severity directly.
    ApplyBump,
    /// Produce or advance a prerelease version.
    PreRelease,
    /// Strip a prerelease suffix into the stable version.
    Finalize,
    /// Mirror a version from a source manifest, no arithmetic.
    Sync,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoNothing => write!(f, "do-nothing"),
            Self::ApplyBump => write!(f, "apply-bump"),
            Self::PreRelease => write!(f, "pre-release"),
            Self::Finalize => write!(f, "finalize"),
            Self::Sync => write!(f, "sync"),
        }
    }
}

/// Inputs to one bump decision.
#[derive(Debug, Clone)]
pub struct BumpRequest<'a> {
    /// The package's current version.
    pub current: &'a Version,
    /// Severity derived from commits since the reference point.
    pub commit_bump: Option<BumpKind>,
    /// Severity derived from diffing reference vs. current version.
    pub historical_bump: Option<BumpKind>,
    /// Source version for the sync policy, when one is known.
    pub sync_source: Option<&'a Version>,
}

/// Compute the next version under a policy, `None` meaning no-op.
#[must_use]
pub fn bump_version(policy: Policy, req: &BumpRequest<'_>) -> Option<Version> {
    match policy {
        Policy::DoNothing => None,
        Policy::ApplyBump => {
            let kind = req.commit_bump?;
            version::next_stable(req.current, kind)
        }
        Policy::PreRelease => {
            let kind = req.commit_bump?;
            version::bump_prerelease(req.current, kind)
        }
        Policy::Finalize => version::finalize(req.current),
        Policy::Sync => {
            let source = req.sync_source?;
            if source == req.current {
                return None;
            }
            Some(source.clone())
        }
    }
}

/// The historical severity: what already moved between the reference
/// version and the current one.
#[must_use]
pub fn historical_bump(reference: &Version, current: &Version) -> Option<BumpKind> {
    version::diff_kind(reference, current)
}

/// Resolve the policy actually applied to one package.
///
/// A flow policy of `DoNothing` (or none at all) defers to the
/// commit/history comparison: when commits call for a different severity
/// than history already shows, the bump is applied; when they agree, the
/// change is already represented and nothing happens, unless discovery
/// forced a bump to guarantee forward progress.
#[must_use]
pub fn effective_policy(
    flow_policy: Policy,
    commit_bump: Option<BumpKind>,
    historical_bump: Option<BumpKind>,
    force_bump: bool,
) -> Policy {
    match flow_policy {
        Policy::PreRelease | Policy::Finalize | Policy::Sync | Policy::ApplyBump => flow_policy,
        Policy::DoNothing => {
            if commit_bump.is_some() && commit_bump != historical_bump {
                return Policy::ApplyBump;
            }
            if force_bump {
                return Policy::ApplyBump;
            }
            Policy::DoNothing
        }
    }
}

/// The bump kind recorded for a computed next version.
///
/// Policies that do arithmetic already know their kind; sync derives it
/// from the observed difference.
#[must_use]
pub fn result_kind(policy: Policy, req: &BumpRequest<'_>, next: &Version) -> BumpKind {
    match policy {
        Policy::ApplyBump | Policy::DoNothing => req.commit_bump.unwrap_or(BumpKind::Patch),
        Policy::PreRelease => BumpKind::Prerelease,
        Policy::Finalize => BumpKind::Release,
        Policy::Sync => version::diff_kind(req.current, next).unwrap_or(BumpKind::Release),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::coerce;

    fn req<'a>(
        current: &'a Version,
        commit: Option<BumpKind>,
        historical: Option<BumpKind>,
    ) -> BumpRequest<'a> {
        BumpRequest {
            current,
            commit_bump: commit,
            historical_bump: historical,
            sync_source: None,
        }
    }

    #[test]
    fn do_nothing_is_always_noop() {
        let v = Version::new(1, 2, 0);
        for commit in [
            None,
            Some(BumpKind::Major),
            Some(BumpKind::Minor),
            Some(BumpKind::Patch),
        ] {
            for historical in [None, Some(BumpKind::Minor)] {
                assert_eq!(
                    bump_version(Policy::DoNothing, &req(&v, commit, historical)),
                    None
                );
            }
        }
    }

    #[test]
    fn apply_bump_minor() {
        // current 1.2.0, reference 1.2.0, minor commits, no history
        let v = Version::new(1, 2, 0);
        let next = bump_version(Policy::ApplyBump, &req(&v, Some(BumpKind::Minor), None));
        assert_eq!(next, Some(Version::new(1, 3, 0)));
    }

    #[test]
    fn apply_bump_without_severity_is_noop() {
        let v = Version::new(1, 2, 0);
        assert_eq!(bump_version(Policy::ApplyBump, &req(&v, None, None)), None);
        assert_eq!(
            bump_version(Policy::ApplyBump, &req(&v, Some(BumpKind::Release), None)),
            None
        );
    }

    #[test]
    fn apply_bump_is_monotonic() {
        let v0 = Version::new(1, 2, 0);
        let v1 = bump_version(Policy::ApplyBump, &req(&v0, Some(BumpKind::Patch), None)).unwrap();
        let v2 = bump_version(Policy::ApplyBump, &req(&v1, Some(BumpKind::Patch), None)).unwrap();
        assert!(v1 > v0);
        assert!(v2 > v1);
        assert_ne!(v1, v2);
    }

    #[test]
    fn prerelease_advances_counter() {
        let v = coerce("1.3.0-1");
        let next = bump_version(Policy::PreRelease, &req(&v, Some(BumpKind::Minor), None));
        assert_eq!(next, Some(coerce("1.3.0-2")));
    }

    #[test]
    fn prerelease_starts_new_line() {
        let v = Version::new(1, 2, 0);
        let next = bump_version(Policy::PreRelease, &req(&v, Some(BumpKind::Minor), None));
        assert_eq!(next, Some(coerce("1.3.0-1")));
    }

    #[test]
    fn prerelease_without_severity_is_noop() {
        let v = Version::new(1, 2, 0);
        assert_eq!(bump_version(Policy::PreRelease, &req(&v, None, None)), None);
    }

    #[test]
    fn finalize_strips_prerelease() {
        let v = coerce("1.3.0-2");
        let next = bump_version(Policy::Finalize, &req(&v, None, None));
        assert_eq!(next, Some(Version::new(1, 3, 0)));
    }

    #[test]
    fn finalize_noop_on_stable() {
        let v = Version::new(1, 3, 0);
        assert_eq!(bump_version(Policy::Finalize, &req(&v, None, None)), None);
    }

    #[test]
    fn finalize_after_prerelease_chain_round_trips() {
        let start = Version::new(1, 2, 0);
        let pre = bump_version(Policy::PreRelease, &req(&start, Some(BumpKind::Minor), None))
            .unwrap();
        let pre2 = bump_version(Policy::PreRelease, &req(&pre, Some(BumpKind::Minor), None))
            .unwrap();
        let stable = bump_version(Policy::Finalize, &req(&pre2, None, None)).unwrap();
        assert_eq!(stable, Version::new(1, 3, 0));
        assert!(stable.pre.is_empty());
    }

    #[test]
    fn sync_copies_verbatim() {
        let v = Version::new(1, 2, 0);
        let source = coerce("3.1.4-2");
        let mut request = req(&v, None, None);
        request.sync_source = Some(&source);
        assert_eq!(bump_version(Policy::Sync, &request), Some(source.clone()));
    }

    #[test]
    fn sync_noop_when_equal_or_unknown() {
        let v = Version::new(1, 2, 0);
        let mut request = req(&v, Some(BumpKind::Major), None);
        request.sync_source = Some(&v);
        assert_eq!(bump_version(Policy::Sync, &request), None);

        let request = req(&v, Some(BumpKind::Major), None);
        assert_eq!(bump_version(Policy::Sync, &request), None);
    }

    #[test]
    fn effective_policy_applies_new_severity() {
        let p = effective_policy(Policy::DoNothing, Some(BumpKind::Minor), None, false);
        assert_eq!(p, Policy::ApplyBump);
    }

    #[test]
    fn effective_policy_stays_quiet_when_history_agrees() {
        let p = effective_policy(
            Policy::DoNothing,
            Some(BumpKind::Minor),
            Some(BumpKind::Minor),
            false,
        );
        assert_eq!(p, Policy::DoNothing);
    }

    #[test]
    fn effective_policy_force_overrides_agreement() {
        let p = effective_policy(
            Policy::DoNothing,
            Some(BumpKind::Minor),
            Some(BumpKind::Minor),
            true,
        );
        assert_eq!(p, Policy::ApplyBump);

        let p = effective_policy(Policy::DoNothing, None, None, true);
        assert_eq!(p, Policy::ApplyBump);
    }

    #[test]
    fn effective_policy_keeps_explicit_flows() {
        for policy in [Policy::PreRelease, Policy::Finalize, Policy::Sync] {
            assert_eq!(
                effective_policy(policy, Some(BumpKind::Major), None, true),
                policy
            );
        }
    }

    #[test]
    fn historical_bump_diffs_components() {
        assert_eq!(
            historical_bump(&Version::new(1, 2, 0), &Version::new(1, 3, 0)),
            Some(BumpKind::Minor)
        );
        assert_eq!(
            historical_bump(&Version::new(1, 2, 0), &Version::new(1, 2, 0)),
            None
        );
    }
}
