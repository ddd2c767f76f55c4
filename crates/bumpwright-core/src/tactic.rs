//! Fallback execution primitives: tactics, maneuvers, and plans.
//!
//! A [`Tactic`] is a single attempt with a precondition. A maneuver runs a
//! sequence of tactics under one of three shapes ([`one`], [`any`],
//! [`all`]), and a [`Plan`] is a named sequence with `one` semantics that
//! can itself be used as a tactic inside a larger plan.
//!
//! Context is a value, not a shared mutable object: the executor owns it,
//! and a successful tactic contributes a patch that is merged immutably
//! before the result is returned. A tactic that returns `Err` is recorded
//! as applied-but-failed; execution moves on to the next tactic and only
//! exhaustion of a whole `one`/plan surfaces an error to the caller.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

/// Boxed error produced by a tactic's attempt.
///
/// Converted into an applied-but-failed [`Attempt`] at the executor
/// boundary; it never aborts the maneuver on its own.
pub type TacticError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Context types that can absorb a tactic's patch.
///
/// `merged` consumes the context and returns the updated value, keeping the
/// executor free of in-place mutation.
pub trait Merge: Sized {
    /// The patch a successful tactic may contribute.
    type Patch;

    /// Fold a patch into the context, producing the next context value.
    #[must_use]
    fn merged(self, patch: Self::Patch) -> Self;
}

/// The result of one tactic's attempt.
#[derive(Debug)]
pub struct Attempt<T, P> {
    /// Whether the tactic considered itself applicable once running.
    pub applied: bool,
    /// Whether the tactic produced a usable value.
    pub success: bool,
    /// The produced value, present iff `success`.
    pub value: Option<T>,
    /// Human-readable note about what happened.
    pub message: String,
    /// Context patch to merge on success.
    pub patch: Option<P>,
}

impl<T, P> Attempt<T, P> {
    /// A successful attempt carrying a value.
    pub fn success(value: T, message: impl Into<String>) -> Self {
        Self {
            applied: true,
            success: true,
            value: Some(value),
            message: message.into(),
            patch: None,
        }
    }

    /// A successful attempt carrying a value and a context patch.
    pub fn success_with(value: T, patch: P, message: impl Into<String>) -> Self {
        Self {
            patch: Some(patch),
            ..Self::success(value, message)
        }
    }

    /// An applied attempt that did not produce a value.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            applied: true,
            success: false,
            value: None,
            message: message.into(),
            patch: None,
        }
    }

    /// An attempt that discovered mid-flight it does not apply.
    pub fn not_applicable(message: impl Into<String>) -> Self {
        Self {
            applied: false,
            success: false,
            value: None,
            message: message.into(),
            patch: None,
        }
    }
}

/// A single fallback step: an applicability check plus an attempt.
pub trait Tactic<C: Merge, T> {
    /// Name used in logs and aggregate errors.
    fn name(&self) -> &str;

    /// Side-effect-free applicability check.
    fn assess(&self, ctx: &C) -> bool;

    /// Try to produce a value. Errors are converted into
    /// applied-but-failed attempts by the executor.
    fn attempt(&self, ctx: &C) -> Result<Attempt<T, C::Patch>, TacticError>;
}

/// How a tactic fared within a maneuver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TacticStatus {
    /// Precondition not met; not counted as a failure.
    Skipped,
    /// Applied but produced no value.
    Failed,
    /// Applied and produced a value.
    Succeeded,
}

impl fmt::Display for TacticStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
            Self::Succeeded => write!(f, "succeeded"),
        }
    }
}

/// One tactic's outcome inside a maneuver, kept for aggregate reporting.
#[derive(Debug, Clone)]
pub struct TacticOutcome {
    /// The tactic's name.
    pub tactic: String,
    /// What happened.
    pub status: TacticStatus,
    /// The attempt's message (or the skip reason).
    pub message: String,
}

impl fmt::Display for TacticOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.tactic, self.status, self.message)
    }
}

/// Errors from maneuver execution.
#[derive(Error, Debug)]
pub enum ManeuverError {
    /// Every tactic was skipped or failed.
    #[error("'{maneuver}' exhausted all tactics: {}", summarize(.outcomes))]
    Exhausted {
        /// The maneuver or plan name.
        maneuver: String,
        /// Every tactic's outcome, in execution order.
        outcomes: Vec<TacticOutcome>,
    },

    /// An authoritative tactic failed under `any` semantics.
    #[error("'{maneuver}' failed on authoritative tactic: {outcome}")]
    Authoritative {
        /// The maneuver name.
        maneuver: String,
        /// The failing tactic's outcome.
        outcome: TacticOutcome,
    },
}

fn summarize(outcomes: &[TacticOutcome]) -> String {
    outcomes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias for maneuver execution.
pub type ManeuverResult<T> = Result<T, ManeuverError>;

/// Normalize an attempt result, converting tactic errors into
/// applied-but-failed attempts.
fn settle<T, P>(result: Result<Attempt<T, P>, TacticError>) -> Attempt<T, P> {
    match result {
        Ok(attempt) => attempt,
        Err(e) => Attempt::failure(e.to_string()),
    }
}

/// Run tactics in order until one applies and succeeds.
///
/// Non-applicable tactics are logged and skipped. An applied-but-failed
/// tactic logs and yields to the next. The first success merges its patch
/// into the context and returns `(value, context)`. Exhaustion returns an
/// aggregate error naming every tactic's outcome.
pub fn one<C: Merge, T>(
    maneuver: &str,
    tactics: &[&dyn Tactic<C, T>],
    ctx: C,
) -> ManeuverResult<(T, C)> {
    let mut outcomes = Vec::with_capacity(tactics.len());

    for tactic in tactics {
        if let Some(attempt) = try_tactic(maneuver, *tactic, &ctx, &mut outcomes)
            && let Some(value) = attempt.value
        {
            let ctx = match attempt.patch {
                Some(patch) => ctx.merged(patch),
                None => ctx,
            };
            return Ok((value, ctx));
        }
    }

    Err(ManeuverError::Exhausted {
        maneuver: maneuver.to_string(),
        outcomes,
    })
}

/// Run tactics in order, treating the first applicable one as authoritative.
///
/// Like [`one`], but an applied-but-failed tactic fails the whole maneuver
/// immediately instead of falling through.
pub fn any<C: Merge, T>(
    maneuver: &str,
    tactics: &[&dyn Tactic<C, T>],
    ctx: C,
) -> ManeuverResult<(T, C)> {
    let mut outcomes = Vec::with_capacity(tactics.len());

    for tactic in tactics {
        if !tactic.assess(&ctx) {
            debug!(maneuver, tactic = tactic.name(), "tactic not applicable");
            outcomes.push(TacticOutcome {
                tactic: tactic.name().to_string(),
                status: TacticStatus::Skipped,
                message: "precondition not met".to_string(),
            });
            continue;
        }

        let attempt = settle(tactic.attempt(&ctx));
        if !attempt.applied {
            outcomes.push(TacticOutcome {
                tactic: tactic.name().to_string(),
                status: TacticStatus::Skipped,
                message: attempt.message,
            });
            continue;
        }

        if attempt.success
            && let Some(value) = attempt.value
        {
            let ctx = match attempt.patch {
                Some(patch) => ctx.merged(patch),
                None => ctx,
            };
            return Ok((value, ctx));
        }

        // First applicable tactic is authoritative here.
        warn!(maneuver, tactic = tactic.name(), message = %attempt.message, "authoritative tactic failed");
        return Err(ManeuverError::Authoritative {
            maneuver: maneuver.to_string(),
            outcome: TacticOutcome {
                tactic: tactic.name().to_string(),
                status: TacticStatus::Failed,
                message: attempt.message,
            },
        });
    }

    Err(ManeuverError::Exhausted {
        maneuver: maneuver.to_string(),
        outcomes,
    })
}

/// Run every applicable tactic and collect all produced values.
///
/// Patches merge as successes arrive, so later tactics observe earlier
/// patches. Succeeds when at least one tactic succeeded.
pub fn all<C: Merge, T>(
    maneuver: &str,
    tactics: &[&dyn Tactic<C, T>],
    mut ctx: C,
) -> ManeuverResult<(Vec<T>, C)> {
    let mut outcomes = Vec::with_capacity(tactics.len());
    let mut values = Vec::new();

    for tactic in tactics {
        if !tactic.assess(&ctx) {
            debug!(maneuver, tactic = tactic.name(), "tactic not applicable");
            outcomes.push(TacticOutcome {
                tactic: tactic.name().to_string(),
                status: TacticStatus::Skipped,
                message: "precondition not met".to_string(),
            });
            continue;
        }

        let attempt = settle(tactic.attempt(&ctx));
        let status = if attempt.success {
            TacticStatus::Succeeded
        } else if attempt.applied {
            TacticStatus::Failed
        } else {
            TacticStatus::Skipped
        };
        outcomes.push(TacticOutcome {
            tactic: tactic.name().to_string(),
            status,
            message: attempt.message,
        });

        if attempt.success {
            values.extend(attempt.value);
            if let Some(patch) = attempt.patch {
                ctx = ctx.merged(patch);
            }
        }
    }

    if values.is_empty() {
        return Err(ManeuverError::Exhausted {
            maneuver: maneuver.to_string(),
            outcomes,
        });
    }

    Ok((values, ctx))
}

/// Shared step logic for [`one`]-shaped execution.
///
/// Returns `Some(attempt)` on success, `None` to continue; records the
/// outcome either way.
fn try_tactic<C: Merge, T>(
    maneuver: &str,
    tactic: &dyn Tactic<C, T>,
    ctx: &C,
    outcomes: &mut Vec<TacticOutcome>,
) -> Option<Attempt<T, C::Patch>> {
    if !tactic.assess(ctx) {
        debug!(maneuver, tactic = tactic.name(), "tactic not applicable");
        outcomes.push(TacticOutcome {
            tactic: tactic.name().to_string(),
            status: TacticStatus::Skipped,
            message: "precondition not met".to_string(),
        });
        return None;
    }

    let attempt = settle(tactic.attempt(ctx));

    if attempt.success && attempt.value.is_some() {
        debug!(maneuver, tactic = tactic.name(), message = %attempt.message, "tactic succeeded");
        outcomes.push(TacticOutcome {
            tactic: tactic.name().to_string(),
            status: TacticStatus::Succeeded,
            message: attempt.message.clone(),
        });
        return Some(attempt);
    }

    let status = if attempt.applied {
        warn!(maneuver, tactic = tactic.name(), message = %attempt.message, "tactic failed, trying next");
        TacticStatus::Failed
    } else {
        debug!(maneuver, tactic = tactic.name(), message = %attempt.message, "tactic withdrew");
        TacticStatus::Skipped
    };
    outcomes.push(TacticOutcome {
        tactic: tactic.name().to_string(),
        status,
        message: attempt.message,
    });
    None
}

/// A named ordered sequence of tactics run with [`one`] semantics.
///
/// A plan also implements [`Tactic`], so it can serve as a single step in
/// an enclosing plan.
pub struct Plan<'a, C: Merge, T> {
    name: String,
    steps: Vec<&'a dyn Tactic<C, T>>,
}

impl<'a, C: Merge, T> Plan<'a, C, T> {
    /// Create a plan from named steps.
    pub fn new(name: impl Into<String>, steps: Vec<&'a dyn Tactic<C, T>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// The plan's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the plan to completion, consuming a context.
    pub fn run(&self, ctx: C) -> ManeuverResult<(T, C)> {
        one(&self.name, &self.steps, ctx)
    }
}

impl<C: Merge, T> Tactic<C, T> for Plan<'_, C, T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn assess(&self, ctx: &C) -> bool {
        self.steps.iter().any(|t| t.assess(ctx))
    }

    fn attempt(&self, ctx: &C) -> Result<Attempt<T, C::Patch>, TacticError> {
        let mut outcomes = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            if let Some(attempt) = try_tactic(&self.name, *step, ctx, &mut outcomes) {
                // Bubble the winning sub-attempt so the outer executor
                // merges its patch exactly once.
                return Ok(attempt);
            }
        }
        Ok(Attempt::failure(format!(
            "'{}' exhausted all tactics: {}",
            self.name,
            summarize(&outcomes)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Ctx {
        notes: Vec<String>,
    }

    impl Ctx {
        fn new() -> Self {
            Self { notes: Vec::new() }
        }
    }

    impl Merge for Ctx {
        type Patch = String;

        fn merged(mut self, patch: String) -> Self {
            self.notes.push(patch);
            self
        }
    }

    struct Fixed {
        name: &'static str,
        applicable: bool,
        result: Result<i32, &'static str>,
        patch: Option<&'static str>,
    }

    impl Fixed {
        const fn ok(name: &'static str, value: i32) -> Self {
            Self {
                name,
                applicable: true,
                result: Ok(value),
                patch: None,
            }
        }

        const fn fail(name: &'static str, message: &'static str) -> Self {
            Self {
                name,
                applicable: true,
                result: Err(message),
                patch: None,
            }
        }

        const fn skip(name: &'static str) -> Self {
            Self {
                name,
                applicable: false,
                result: Err("unused"),
                patch: None,
            }
        }
    }

    impl Tactic<Ctx, i32> for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn assess(&self, _ctx: &Ctx) -> bool {
            self.applicable
        }

        fn attempt(&self, _ctx: &Ctx) -> Result<Attempt<i32, String>, TacticError> {
            match self.result {
                Ok(v) => Ok(match self.patch {
                    Some(p) => Attempt::success_with(v, p.to_string(), "ok"),
                    None => Attempt::success(v, "ok"),
                }),
                Err(m) => Ok(Attempt::failure(m)),
            }
        }
    }

    /// A tactic whose attempt errors out, exercising the catch boundary.
    struct Exploding;

    impl Tactic<Ctx, i32> for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn assess(&self, _ctx: &Ctx) -> bool {
            true
        }

        fn attempt(&self, _ctx: &Ctx) -> Result<Attempt<i32, String>, TacticError> {
            Err("boom".into())
        }
    }

    #[test]
    fn one_returns_first_success() {
        let a = Fixed::fail("a", "nope");
        let b = Fixed::ok("b", 7);
        let c = Fixed::ok("c", 9);
        let (value, _ctx) = one("test", &[&a, &b, &c], Ctx::new()).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn one_skips_inapplicable() {
        let a = Fixed::skip("a");
        let b = Fixed::ok("b", 1);
        let (value, _ctx) = one("test", &[&a, &b], Ctx::new()).unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn one_exhaustion_lists_every_outcome() {
        let a = Fixed::skip("a");
        let b = Fixed::fail("b", "b broke");
        let err = one::<Ctx, i32>("test", &[&a, &b], Ctx::new()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("a: skipped"));
        assert!(msg.contains("b: failed"));
        assert!(msg.contains("b broke"));
    }

    #[test]
    fn one_converts_errors_to_failures() {
        let boom = Exploding;
        let rescue = Fixed::ok("rescue", 42);
        let (value, _ctx) = one("test", &[&boom, &rescue], Ctx::new()).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn one_merges_winning_patch() {
        let mut winner = Fixed::ok("winner", 3);
        winner.patch = Some("note");
        let (_, ctx) = one("test", &[&winner], Ctx::new()).unwrap();
        assert_eq!(ctx.notes, vec!["note"]);
    }

    #[test]
    fn any_fails_on_first_applicable_failure() {
        let a = Fixed::skip("a");
        let b = Fixed::fail("b", "authoritative break");
        let c = Fixed::ok("c", 5);
        let err = any("test", &[&a, &b, &c], Ctx::new()).unwrap_err();
        assert!(matches!(err, ManeuverError::Authoritative { .. }));
    }

    #[test]
    fn any_succeeds_on_first_applicable_success() {
        let a = Fixed::skip("a");
        let b = Fixed::ok("b", 5);
        let (value, _ctx) = any("test", &[&a, &b], Ctx::new()).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn all_collects_every_success() {
        let a = Fixed::ok("a", 1);
        let b = Fixed::fail("b", "nope");
        let c = Fixed::ok("c", 3);
        let (values, _ctx) = all("test", &[&a, &b, &c], Ctx::new()).unwrap();
        assert_eq!(values, vec![1, 3]);
    }

    #[test]
    fn all_fails_when_nothing_succeeds() {
        let a = Fixed::fail("a", "x");
        let b = Fixed::skip("b");
        let err = all::<Ctx, i32>("test", &[&a, &b], Ctx::new()).unwrap_err();
        assert!(matches!(err, ManeuverError::Exhausted { .. }));
    }

    #[test]
    fn plan_runs_with_one_semantics() {
        let a = Fixed::fail("a", "no");
        let b = Fixed::ok("b", 11);
        let plan = Plan::new("discovery", vec![&a as &dyn Tactic<Ctx, i32>, &b]);
        let (value, _ctx) = plan.run(Ctx::new()).unwrap();
        assert_eq!(value, 11);
    }

    #[test]
    fn plan_nests_as_a_tactic() {
        let inner_fail = Fixed::fail("inner-fail", "no");
        let inner_ok = Fixed::ok("inner-ok", 21);
        let sub = Plan::new(
            "sub",
            vec![&inner_fail as &dyn Tactic<Ctx, i32>, &inner_ok],
        );

        let outer_fail = Fixed::fail("outer-fail", "no");
        let (value, _ctx) = one(
            "outer",
            &[&outer_fail as &dyn Tactic<Ctx, i32>, &sub],
            Ctx::new(),
        )
        .unwrap();
        assert_eq!(value, 21);
    }

    #[test]
    fn exhausted_plan_reports_as_failed_step() {
        let inner = Fixed::fail("inner", "broken");
        let sub = Plan::new("sub", vec![&inner as &dyn Tactic<Ctx, i32>]);
        let err = one::<Ctx, i32>("outer", &[&sub], Ctx::new()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("sub"));
        assert!(msg.contains("broken"));
    }
}
