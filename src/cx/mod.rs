//! Capability context handed to every interpretation.
//!
//! A computation has no ambient access to a clock or an event loop. When a
//! host interprets a computation it passes a [`Cx`], and every effectful
//! leaf reaches the host only through it:
//!
//! - timers for [`after`](crate::future::after) and
//!   [`reject_after`](crate::future::reject_after)
//! - parking of external callbacks that complete on another thread
//!   ([`NodeDone::into_remote`](crate::future::NodeDone::into_remote))
//!
//! It also carries the depth-bounded run queue sequential combinators use
//! to start their next child without growing the stack.
//!
//! # Module Contents
//!
//! - [`Cx`]: The capability context token

pub mod cx;
mod trampoline;

pub use cx::Cx;
