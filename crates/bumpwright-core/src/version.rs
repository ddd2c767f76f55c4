//! Bump severities and semver arithmetic.
//!
//! Everything here is pure: coercion of raw version strings, the severity
//! total order, increment arithmetic, prerelease counters, and the
//! historical diff used to compare a reference version against the current
//! one.

use std::fmt;

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};

/// The magnitude of a version change.
///
/// Ordered `major > minor > patch > prerelease/release`; `Prerelease` and
/// `Release` share the lowest rank. Use [`BumpKind::max`] for reductions
/// over commit sets rather than `Ord`, which this type deliberately does
/// not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    /// Breaking change (X.0.0).
    Major,
    /// New functionality (x.Y.0).
    Minor,
    /// Fix-level change (x.y.Z).
    Patch,
    /// Prerelease counter increment (x.y.z-N).
    Prerelease,
    /// Prerelease finalized into its stable version.
    Release,
}

impl BumpKind {
    /// Position in the severity total order. Higher is more severe.
    const fn rank(self) -> u8 {
        match self {
            Self::Major => 3,
            Self::Minor => 2,
            Self::Patch => 1,
            Self::Prerelease | Self::Release => 0,
        }
    }

    /// The more severe of two kinds. On equal rank, `self` wins.
    #[must_use]
    pub const fn max(self, other: Self) -> Self {
        if other.rank() > self.rank() { other } else { self }
    }

    /// The more severe of two optional kinds.
    #[must_use]
    pub fn max_of(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (Some(x), None) => Some(x),
            (None, y) => y,
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
            Self::Prerelease => write!(f, "prerelease"),
            Self::Release => write!(f, "release"),
        }
    }
}

/// A finished bump for one package, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BumpResult {
    /// The version the package now carries.
    pub version: Version,
    /// How the version moved.
    pub kind: BumpKind,
    /// The commit recording the bump, when one was created.
    pub sha: Option<String>,
}

/// Coerce a raw version string into a valid semver version.
///
/// Strips a leading `v`, pads missing components (`"1.2"` becomes `1.2.0`),
/// and falls back to `0.0.0` for anything unparseable. Missing input is the
/// caller's `0.0.0` via `coerce("")`.
pub fn coerce(raw: &str) -> Version {
    let s = raw.trim();
    let s = s.strip_prefix('v').unwrap_or(s);
    if let Ok(v) = Version::parse(s) {
        return v;
    }

    // Pad "1" or "1.2" style versions, preserving any -pre suffix.
    let (core, pre) = match s.split_once('-') {
        Some((c, p)) => (c, Some(p)),
        None => (s, None),
    };
    let dots = core.chars().filter(|&c| c == '.').count();
    if dots < 2 {
        let padded = match dots {
            0 => format!("{core}.0.0"),
            _ => format!("{core}.0"),
        };
        let candidate = match pre {
            Some(p) => format!("{padded}-{p}"),
            None => padded,
        };
        if let Ok(v) = Version::parse(&candidate) {
            return v;
        }
    }

    Version::new(0, 0, 0)
}

/// Compute the next stable version for a major/minor/patch kind.
///
/// Prerelease and build metadata are dropped. Returns `None` for
/// `Prerelease`/`Release`, which are not stable increments.
#[must_use]
pub fn next_stable(current: &Version, kind: BumpKind) -> Option<Version> {
    match kind {
        BumpKind::Major => Some(Version::new(current.major + 1, 0, 0)),
        BumpKind::Minor => Some(Version::new(current.major, current.minor + 1, 0)),
        BumpKind::Patch => Some(Version::new(current.major, current.minor, current.patch + 1)),
        BumpKind::Prerelease | BumpKind::Release => None,
    }
}

/// Advance a prerelease version's counter, or start a new prerelease line.
///
/// An existing prerelease keeps its numbers and increments only the counter
/// (`1.3.0-1` to `1.3.0-2`). A stable version is bumped by `kind` and given
/// an initial `-1` marker.
#[must_use]
pub fn bump_prerelease(current: &Version, kind: BumpKind) -> Option<Version> {
    if current.pre.is_empty() {
        let mut next = next_stable(current, kind)?;
        next.pre = Prerelease::new("1").ok()?;
        return Some(next);
    }

    let mut next = current.clone();
    next.pre = Prerelease::new(&advance_counter(current.pre.as_str())).ok()?;
    next.build = BuildMetadata::EMPTY;
    Some(next)
}

/// Increment the trailing numeric identifier of a prerelease string.
///
/// `"1"` becomes `"2"`, `"rc.3"` becomes `"rc.4"`, and a fully
/// non-numeric prerelease gets a `.1` counter appended.
fn advance_counter(pre: &str) -> String {
    if let Some((head, tail)) = pre.rsplit_once('.') {
        if let Ok(n) = tail.parse::<u64>() {
            return format!("{head}.{}", n + 1);
        }
    } else if let Ok(n) = pre.parse::<u64>() {
        return (n + 1).to_string();
    }
    format!("{pre}.1")
}

/// Strip the prerelease suffix, yielding the stable version.
///
/// Returns `None` when the version is already stable.
#[must_use]
pub fn finalize(current: &Version) -> Option<Version> {
    if current.pre.is_empty() {
        return None;
    }
    Some(Version::new(current.major, current.minor, current.patch))
}

/// Classify the difference between a reference version and the current one.
///
/// This is the "historical" severity: which component moved since the
/// reference point. Equal versions yield `None`.
#[must_use]
pub fn diff_kind(reference: &Version, current: &Version) -> Option<BumpKind> {
    if current.major != reference.major {
        return Some(BumpKind::Major);
    }
    if current.minor != reference.minor {
        return Some(BumpKind::Minor);
    }
    if current.patch != reference.patch {
        return Some(BumpKind::Patch);
    }
    if current.pre != reference.pre {
        if current.pre.is_empty() {
            return Some(BumpKind::Release);
        }
        return Some(BumpKind::Prerelease);
    }
    None
}
