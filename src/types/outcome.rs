//! Three-valued outcome type with severity lattice.
//!
//! An interpretation session settles with exactly one of:
//!
//! - `Resolve(T)`: success with a value
//! - `Reject(E)`: a modeled, expected failure
//! - `Crash(Crash)`: a programmer or contract defect
//!
//! These form a severity lattice: `Resolve < Reject < Crash`.
//!
//! Cancellation is not an outcome: a cancelled session delivers nothing.

use super::crash::Crash;
use core::fmt;

/// Severity levels of an [`Outcome`], ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Success.
    Resolve,
    /// Modeled failure.
    Reject,
    /// Defect.
    Crash,
}

/// The settled result of interpreting a computation.
#[derive(Debug, Clone)]
pub enum Outcome<T, E> {
    /// Success with a value.
    Resolve(T),
    /// Expected failure.
    Reject(E),
    /// Unexpected failure with its derivation trail.
    Crash(Crash),
}

impl<T, E> Outcome<T, E> {
    /// Returns the severity of this outcome.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Resolve(_) => Severity::Resolve,
            Self::Reject(_) => Severity::Reject,
            Self::Crash(_) => Severity::Crash,
        }
    }

    /// Returns true if this outcome is `Resolve`.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolve(_))
    }

    /// Returns true if this outcome is `Reject`.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Reject(_))
    }

    /// Returns true if this outcome is `Crash`.
    #[must_use]
    pub const fn is_crashed(&self) -> bool {
        matches!(self, Self::Crash(_))
    }

    /// Returns the resolved value, if any.
    pub fn resolved(self) -> Option<T> {
        match self {
            Self::Resolve(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the rejection reason, if any.
    pub fn rejected(self) -> Option<E> {
        match self {
            Self::Reject(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the crash, if any.
    pub fn crashed(self) -> Option<Crash> {
        match self {
            Self::Crash(c) => Some(c),
            _ => None,
        }
    }

    /// Converts this outcome to a standard Result, with rejection and crash as errors.
    pub fn into_result(self) -> Result<T, OutcomeError<E>> {
        match self {
            Self::Resolve(v) => Ok(v),
            Self::Reject(e) => Err(OutcomeError::Reject(e)),
            Self::Crash(c) => Err(OutcomeError::Crash(c)),
        }
    }

    /// Maps the success value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U, E> {
        match self {
            Self::Resolve(v) => Outcome::Resolve(f(v)),
            Self::Reject(e) => Outcome::Reject(e),
            Self::Crash(c) => Outcome::Crash(c),
        }
    }

    /// Maps the rejection reason using the provided function.
    pub fn map_err<F2, G: FnOnce(E) -> F2>(self, g: G) -> Outcome<T, F2> {
        match self {
            Self::Resolve(v) => Outcome::Resolve(v),
            Self::Reject(e) => Outcome::Reject(g(e)),
            Self::Crash(c) => Outcome::Crash(c),
        }
    }

    /// Returns the success value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is not `Resolve`.
    #[track_caller]
    pub fn unwrap(self) -> T
    where
        E: fmt::Debug,
    {
        match self {
            Self::Resolve(v) => v,
            Self::Reject(e) => panic!("called `Outcome::unwrap()` on a `Reject` value: {e:?}"),
            Self::Crash(c) => panic!("called `Outcome::unwrap()` on a `Crash` value: {c}"),
        }
    }

    /// Returns the success value or a default.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Resolve(v) => v,
            _ => default,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Resolve(v),
            Err(e) => Self::Reject(e),
        }
    }
}

impl<T: PartialEq, E: PartialEq> PartialEq for Outcome<T, E> {
    /// Crashes compare equal by message and trail phases only.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Resolve(a), Self::Resolve(b)) => a == b,
            (Self::Reject(a), Self::Reject(b)) => a == b,
            (Self::Crash(a), Self::Crash(b)) => {
                a.message() == b.message() && a.phases().eq(b.phases())
            }
            _ => false,
        }
    }
}

/// Error type for converting an [`Outcome`] to a `Result`.
#[derive(Debug, Clone)]
pub enum OutcomeError<E> {
    /// Expected failure.
    Reject(E),
    /// Defect.
    Crash(Crash),
}

impl<E: fmt::Display> fmt::Display for OutcomeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject(e) => write!(f, "rejected: {e}"),
            Self::Crash(c) => write!(f, "{c}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for OutcomeError<E> {}

/// Compares two outcomes by severity and returns the worse one.
///
/// Ties keep the left outcome.
pub fn join_outcomes<T, E>(a: Outcome<T, E>, b: Outcome<T, E>) -> Outcome<T, E> {
    if a.severity() >= b.severity() {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        let resolved: Outcome<i32, &str> = Outcome::Resolve(42);
        let rejected: Outcome<i32, &str> = Outcome::Reject("nope");
        let crashed: Outcome<i32, &str> = Outcome::Crash(Crash::new("boom"));

        assert!(resolved.severity() < rejected.severity());
        assert!(rejected.severity() < crashed.severity());
    }

    #[test]
    fn predicates_and_accessors() {
        let resolved: Outcome<i32, &str> = Outcome::Resolve(1);
        assert!(resolved.is_resolved());
        assert_eq!(resolved.clone().resolved(), Some(1));
        assert_eq!(resolved.rejected(), None);

        let rejected: Outcome<i32, &str> = Outcome::Reject("x");
        assert!(rejected.is_rejected());
        assert_eq!(rejected.rejected(), Some("x"));

        let crashed: Outcome<i32, &str> = Outcome::Crash(Crash::new("boom"));
        assert!(crashed.is_crashed());
        assert_eq!(crashed.crashed().map(|c| c.message().to_string()), Some("boom".into()));
    }

    #[test]
    fn map_and_map_err() {
        let resolved: Outcome<i32, &str> = Outcome::Resolve(2);
        assert_eq!(resolved.map(|x| x * 2), Outcome::Resolve(4));

        let rejected: Outcome<i32, &str> = Outcome::Reject("bad");
        assert_eq!(rejected.map_err(str::len), Outcome::Reject(3));
    }

    #[test]
    fn into_result() {
        let resolved: Outcome<i32, &str> = Outcome::Resolve(7);
        assert_eq!(resolved.into_result().unwrap(), 7);

        let rejected: Outcome<i32, &str> = Outcome::Reject("bad");
        assert!(matches!(rejected.into_result(), Err(OutcomeError::Reject("bad"))));

        let crashed: Outcome<i32, &str> = Outcome::Crash(Crash::new("boom"));
        let err = crashed.into_result().unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn join_takes_worst() {
        let a: Outcome<i32, &str> = Outcome::Resolve(1);
        let b: Outcome<i32, &str> = Outcome::Reject("x");
        assert!(join_outcomes(a, b).is_rejected());

        let a: Outcome<i32, &str> = Outcome::Crash(Crash::new("c"));
        let b: Outcome<i32, &str> = Outcome::Reject("x");
        assert!(join_outcomes(a, b).is_crashed());

        let a: Outcome<i32, &str> = Outcome::Resolve(1);
        let b: Outcome<i32, &str> = Outcome::Resolve(2);
        assert_eq!(join_outcomes(a, b), Outcome::Resolve(1));
    }

    #[test]
    fn from_result() {
        let ok: Outcome<i32, &str> = Ok(1).into();
        assert!(ok.is_resolved());
        let err: Outcome<i32, &str> = Err("e").into();
        assert!(err.is_rejected());
    }

    #[test]
    #[should_panic(expected = "Reject")]
    fn unwrap_panics_on_reject() {
        let rejected: Outcome<i32, &str> = Outcome::Reject("bad");
        let _ = rejected.unwrap();
    }
}
