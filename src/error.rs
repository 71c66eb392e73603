//! Error types for construction-time and configuration failures.
//!
//! Interpretation never reports failures through these types: defects that
//! surface while a computation runs become [`Crash`](crate::types::Crash)
//! outcomes, and modeled failures travel through the reject channel. The
//! errors here are raised synchronously, before any interpretation begins:
//!
//! - [`InvalidArgument`]: a combinator or leaf was given an argument outside
//!   its contract (zero concurrency, a negative delay, ...)
//! - [`ConfigError`]: a host configuration value could not be parsed

use core::fmt;

/// Ordinal names used when a diagnostic refers to an argument or element.
const ORDINALS: [&str; 5] = ["first", "second", "third", "fourth", "fifth"];

/// Describes a zero-based position the way diagnostics refer to it.
///
/// The first five positions read as ordinals ("the second future"); later
/// ones fall back to a one-based number ("future 6").
#[must_use]
pub fn describe_position(index: usize, noun: &str) -> String {
    ORDINALS.get(index).map_or_else(
        || format!("{noun} {}", index + 1),
        |ordinal| format!("the {ordinal} {noun}"),
    )
}

/// An argument violated the contract of the operation it was passed to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} expects {position} to {expectation}\n  Actual: {actual}")]
pub struct InvalidArgument {
    operation: &'static str,
    position: String,
    expectation: &'static str,
    actual: String,
}

impl InvalidArgument {
    /// Creates a new invalid-argument error.
    ///
    /// `index` is the zero-based argument position.
    #[must_use]
    pub fn new(
        operation: &'static str,
        index: usize,
        expectation: &'static str,
        actual: impl fmt::Debug,
    ) -> Self {
        Self {
            operation,
            position: describe_position(index, "argument"),
            expectation,
            actual: format!("{actual:?}"),
        }
    }

    /// Returns the name of the operation that rejected the argument.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Returns what the argument was expected to be.
    #[must_use]
    pub const fn expectation(&self) -> &'static str {
        self.expectation
    }

    /// Returns the rendered offending value.
    #[must_use]
    pub fn actual(&self) -> &str {
        &self.actual
    }
}

/// A host configuration value could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// Name of the environment variable.
        var: &'static str,
        /// Description of the accepted format.
        expected: &'static str,
        /// The raw value found in the environment.
        value: String,
    },
    /// A configuration file could not be read or parsed.
    #[error("failed to load config file: {0}")]
    File(String),
    /// A parsed value is outside its allowed range.
    #[error(transparent)]
    Invalid(#[from] InvalidArgument),
}

/// Convenience alias for results of construction-time validation.
pub type Result<T, E = InvalidArgument> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_use_ordinals_then_numbers() {
        assert_eq!(describe_position(0, "future"), "the first future");
        assert_eq!(describe_position(1, "future"), "the second future");
        assert_eq!(describe_position(4, "future"), "the fifth future");
        assert_eq!(describe_position(5, "future"), "future 6");
    }

    #[test]
    fn invalid_argument_display() {
        let err = InvalidArgument::new("Future.parallel", 0, "be a positive integer", 0usize);
        assert_eq!(
            err.to_string(),
            "Future.parallel expects the first argument to be a positive integer\n  Actual: 0"
        );
        assert_eq!(err.operation(), "Future.parallel");
        assert_eq!(err.actual(), "0");
    }

    #[test]
    fn config_error_wraps_invalid_argument() {
        let err: ConfigError =
            InvalidArgument::new("EventLoopConfig", 0, "be non-zero", 0u64).into();
        assert!(err.to_string().contains("EventLoopConfig"));

        let env = ConfigError::InvalidEnv {
            var: "TRIFUTURE_MAX_STEPS",
            expected: "unsigned integer",
            value: "many".into(),
        };
        assert!(env.to_string().contains("TRIFUTURE_MAX_STEPS"));
    }
}
