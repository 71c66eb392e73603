//! Crash payloads: defects surfaced during interpretation.
//!
//! A [`Crash`] carries the original failure message plus a derivation trail.
//! Each combinator that forwards a crash from user code or from a child may
//! push a [`Frame`] naming the phase it was in, so the rendered message reads
//! as a causal chain from the innermost failure outwards:
//!
//! ```text
//! panic came up while Future.do was passing control to the iterator:
//!   boom
//!
//!   In: Future.do(..)
//!   Via: Future.parallel was running the second future
//! ```
//!
//! Panics raised by user closures are caught at the boundary with
//! [`catch`] and converted into crashes; they never unwind through a host.

use crate::error::InvalidArgument;
use core::fmt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What produced a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrashKind {
    /// A user-supplied closure panicked.
    Panic,
    /// An argument contract was violated at interpretation time.
    InvalidArgument,
    /// Raised explicitly by a computation.
    Explicit,
}

impl CrashKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Panic => "panic",
            Self::InvalidArgument => "invalid argument",
            Self::Explicit => "error",
        }
    }
}

impl fmt::Display for CrashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One step of a crash's derivation trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The phase the reporting combinator was in ("Future.chain was ...").
    pub phase: String,
    /// Rendering of the computation involved, if any.
    pub context: Option<String>,
}

/// An unexpected failure: a programmer or contract defect.
#[derive(Debug, Clone)]
pub struct Crash {
    kind: CrashKind,
    message: String,
    trail: Vec<Frame>,
}

impl Crash {
    /// Creates an explicit crash with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: CrashKind::Explicit,
            message: message.into(),
            trail: Vec::new(),
        }
    }

    /// Creates a crash from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self {
            kind: CrashKind::Panic,
            message: panic_message(payload.as_ref()),
            trail: Vec::new(),
        }
    }

    /// Creates a crash from any error value, keeping its rendered message.
    #[must_use]
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        Self::new(error.to_string())
    }

    /// Creates a crash for an argument contract violated during interpretation.
    #[must_use]
    pub fn invalid_argument(error: &InvalidArgument) -> Self {
        Self {
            kind: CrashKind::InvalidArgument,
            message: error.to_string(),
            trail: Vec::new(),
        }
    }

    /// Returns what produced this crash.
    #[must_use]
    pub const fn kind(&self) -> CrashKind {
        self.kind
    }

    /// Returns the innermost failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the derivation trail, innermost frame first.
    #[must_use]
    pub fn trail(&self) -> &[Frame] {
        &self.trail
    }

    /// Returns the phases of the trail, innermost first.
    pub fn phases(&self) -> impl Iterator<Item = &str> {
        self.trail.iter().map(|frame| frame.phase.as_str())
    }

    /// Adds a frame naming the phase during which the crash surfaced.
    #[must_use]
    pub fn context(mut self, phase: impl Into<String>) -> Self {
        self.trail.push(Frame {
            phase: phase.into(),
            context: None,
        });
        self
    }

    /// Adds a frame naming the phase and the computation involved.
    #[must_use]
    pub fn context_in(mut self, phase: impl Into<String>, context: impl fmt::Display) -> Self {
        self.trail.push(Frame {
            phase: phase.into(),
            context: Some(context.to_string()),
        });
        self
    }
}

impl fmt::Display for Crash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((innermost, outer)) = self.trail.split_first() else {
            return write!(f, "{}: {}", self.kind, self.message);
        };
        write!(
            f,
            "{} came up while {}:\n  {}\n",
            self.kind, innermost.phase, self.message
        )?;
        if let Some(context) = &innermost.context {
            write!(f, "\n  In: {context}\n")?;
        }
        for frame in outer {
            writeln!(f, "  Via: {}", frame.phase)?;
            if let Some(context) = &frame.context {
                writeln!(f, "    In: {context}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Crash {}

/// Runs a user-supplied closure, converting a panic into a [`Crash`].
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, Crash> {
    catch_unwind(AssertUnwindSafe(f)).map_err(Crash::from_panic)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(crash) = payload.downcast_ref::<Crash>() {
        crash.to_string()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_crash_renders_kind_and_message() {
        let crash = Crash::new("boom");
        assert_eq!(crash.to_string(), "error: boom");
        assert_eq!(crash.kind(), CrashKind::Explicit);
        assert!(crash.trail().is_empty());
    }

    #[test]
    fn trail_renders_innermost_first() {
        let crash = Crash::new("boom")
            .context_in("Future.chain was calling its function", "Future.of(..)")
            .context("Future.parallel was running the second future");

        let rendered = crash.to_string();
        assert!(rendered.starts_with("error came up while Future.chain was calling its function:"));
        assert!(rendered.contains("\n  boom\n"));
        assert!(rendered.contains("In: Future.of(..)"));
        assert!(rendered.contains("Via: Future.parallel was running the second future"));

        let phases: Vec<_> = crash.phases().collect();
        assert_eq!(
            phases,
            [
                "Future.chain was calling its function",
                "Future.parallel was running the second future"
            ]
        );
    }

    #[test]
    fn catch_converts_panics() {
        let ok = catch(|| 41 + 1);
        assert_eq!(ok.unwrap(), 42);

        let crashed = catch(|| -> i32 { panic!("intentional") });
        let crash = crashed.unwrap_err();
        assert_eq!(crash.kind(), CrashKind::Panic);
        assert_eq!(crash.message(), "intentional");
    }

    #[test]
    fn catch_keeps_formatted_panic_messages() {
        let value = 7;
        let crash = catch(|| panic!("bad value {value}")).unwrap_err();
        assert_eq!(crash.message(), "bad value 7");
    }

    #[test]
    fn invalid_argument_crash() {
        let err = InvalidArgument::new("Future.after", 0, "be finite", -1i64);
        let crash = Crash::invalid_argument(&err);
        assert_eq!(crash.kind(), CrashKind::InvalidArgument);
        assert!(crash.message().contains("Future.after"));
    }
}
