//! Validated arguments for time-based leaves and bounded parallelism.
//!
//! Both types are checked when they are built, so an out-of-contract value
//! fails synchronously with [`InvalidArgument`] before any interpretation
//! begins.

use crate::error::InvalidArgument;
use core::fmt;
use std::time::Duration;

/// How long a time-based leaf waits before settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Delay {
    /// Settle after the given duration.
    Finite(Duration),
    /// Never settle.
    Infinite,
}

impl Delay {
    /// A zero delay.
    pub const ZERO: Self = Self::Finite(Duration::ZERO);

    /// Creates a finite delay from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self::Finite(Duration::from_millis(millis))
    }

    /// Creates a delay from fractional seconds.
    ///
    /// Positive infinity maps to [`Delay::Infinite`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] for negative or NaN values.
    pub fn from_secs_f64(secs: f64) -> Result<Self, InvalidArgument> {
        if secs.is_nan() || secs < 0.0 {
            return Err(InvalidArgument::new(
                "Future.after",
                0,
                "be a non-negative number",
                secs,
            ));
        }
        if secs.is_infinite() {
            return Ok(Self::Infinite);
        }
        Duration::try_from_secs_f64(secs)
            .map(Self::Finite)
            .map_err(|_| InvalidArgument::new("Future.after", 0, "be representable", secs))
    }

    /// Returns the finite duration, if any.
    #[must_use]
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Self::Finite(duration) => Some(duration),
            Self::Infinite => None,
        }
    }

    /// Returns true for [`Delay::Infinite`].
    #[must_use]
    pub const fn is_infinite(self) -> bool {
        matches!(self, Self::Infinite)
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        Self::Finite(duration)
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(duration) => write!(f, "{duration:?}"),
            Self::Infinite => f.write_str("Infinity"),
        }
    }
}

/// The maximum number of children a parallel session interprets at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concurrency {
    /// At most this many children at once (never zero).
    Limited(usize),
    /// All children at once.
    Unbounded,
}

impl Concurrency {
    /// Creates a bounded limit.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if `limit` is zero.
    pub fn limited(limit: usize) -> Result<Self, InvalidArgument> {
        if limit == 0 {
            return Err(InvalidArgument::new(
                "Future.parallel",
                0,
                "be a positive integer or unbounded",
                limit,
            ));
        }
        Ok(Self::Limited(limit))
    }

    /// Resolves the limit against a concrete number of children.
    ///
    /// The result is at least one so an empty sequence still makes progress.
    #[must_use]
    pub fn resolve(self, len: usize) -> usize {
        match self {
            Self::Limited(limit) => limit.min(len).max(1),
            Self::Unbounded => len.max(1),
        }
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(limit) => write!(f, "{limit}"),
            Self::Unbounded => f.write_str("Infinity"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_from_secs() {
        assert_eq!(
            Delay::from_secs_f64(0.02).unwrap(),
            Delay::Finite(Duration::from_millis(20))
        );
        assert_eq!(Delay::from_secs_f64(f64::INFINITY).unwrap(), Delay::Infinite);
        assert!(Delay::from_secs_f64(-1.0).is_err());
        assert!(Delay::from_secs_f64(f64::NAN).is_err());
    }

    #[test]
    fn delay_ordering_puts_infinite_last() {
        assert!(Delay::from_millis(10) < Delay::from_millis(20));
        assert!(Delay::from_millis(u64::MAX) < Delay::Infinite);
    }

    #[test]
    fn delay_display() {
        assert_eq!(Delay::from_millis(20).to_string(), "20ms");
        assert_eq!(Delay::Infinite.to_string(), "Infinity");
    }

    #[test]
    fn concurrency_rejects_zero() {
        let err = Concurrency::limited(0).unwrap_err();
        assert!(err.to_string().contains("Future.parallel"));
        assert_eq!(Concurrency::limited(2).unwrap(), Concurrency::Limited(2));
    }

    #[test]
    fn concurrency_resolves_against_length() {
        assert_eq!(Concurrency::Limited(2).resolve(5), 2);
        assert_eq!(Concurrency::Limited(8).resolve(5), 5);
        assert_eq!(Concurrency::Unbounded.resolve(5), 5);
        assert_eq!(Concurrency::Unbounded.resolve(0), 1);
    }
}
