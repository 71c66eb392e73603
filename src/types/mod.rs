//! Core value types shared across the crate.
//!
//! - [`Outcome`]: the three-valued settlement of a session
//! - [`Crash`]: a defect with its derivation trail
//! - [`Cancel`], [`CancelSlot`], [`CancelSet`]: cancellation handles
//! - [`Delay`], [`Concurrency`]: validated leaf and combinator arguments
//! - [`Time`], [`TimerId`]: host instants and timer identities

pub mod cancel;
pub mod crash;
pub mod delay;
pub mod id;
pub mod outcome;

pub use cancel::{Cancel, CancelKind, CancelSet, CancelSlot};
pub use crash::{catch, Crash, CrashKind, Frame};
pub use delay::{Concurrency, Delay};
pub use id::{Time, TimerId};
pub use outcome::{join_outcomes, Outcome, OutcomeError, Severity};
