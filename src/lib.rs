//! Trifuture: lazy, cancellable computations with a three-channel outcome.
//!
//! # Overview
//!
//! A [`Computation`] describes an effect without performing it. Interpreting
//! it starts an independent session that settles through exactly one of three
//! channels:
//!
//! - **crash**: a programmer or contract defect, carrying a derivation trail
//! - **reject**: a modeled, expected failure
//! - **resolve**: success with a value
//!
//! Every session returns a [`Cancel`] handle. Calling it before settlement
//! guarantees no outcome is delivered; calling it again, or after settlement,
//! does nothing.
//!
//! # Core Guarantees
//!
//! - **Laziness**: building a computation never runs anything; interpreting
//!   the same value twice gives two independent sessions
//! - **Exactly-once settlement**: at most one continuation fires, at most once
//! - **Propagating cancellation**: composites cancel exactly their live
//!   children
//! - **Stack safety**: long runs of synchronously settling steps execute in
//!   bounded stack
//! - **Guaranteed disposal**: [`hook`](combinator::hook()) disposes every
//!   acquired resource exactly once, cancellation included
//!
//! # Module Structure
//!
//! - [`types`]: Outcomes, crashes, cancellation handles, validated arguments
//! - [`future`]: The computation contract and the leaf computations
//! - [`combinator`]: Sequencing, looping, resource and concurrent combinators
//! - [`cx`]: Capability context passed to every interpretation
//! - [`time`]: Timer substrate shared by the hosts
//! - [`lab`]: Deterministic virtual-time host for testing
//! - [`runtime`]: Wall-clock event loop host and its configuration
//! - [`error`]: Construction-time and configuration errors
//!
//! # Example
//!
//! ```
//! use trifuture::combinator::parallel;
//! use trifuture::future::after;
//! use trifuture::types::{Concurrency, Delay, Outcome};
//! use trifuture::LabRuntime;
//!
//! let fetch = |id: u32| after::<_, String>(Delay::from_millis(20), id * 10);
//! let all = parallel(Concurrency::limited(2)?, (1..=5).map(fetch).collect())
//!     .map(|values| values.into_iter().sum::<u32>());
//!
//! let lab = LabRuntime::default();
//! assert_eq!(lab.block_on(&all), Some(Outcome::Resolve(150)));
//! assert_eq!(lab.now().as_millis(), 60);
//! # Ok::<(), trifuture::error::InvalidArgument>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]

pub mod combinator;
pub mod cx;
pub mod error;
pub mod future;
pub mod lab;
pub mod runtime;
pub mod time;
pub mod tracing_compat;
pub mod types;

#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use cx::Cx;
pub use error::{ConfigError, InvalidArgument};
pub use future::{Computation, Continuation, Interpret};
pub use lab::{LabConfig, LabRuntime};
pub use runtime::{EventLoop, EventLoopConfig};
pub use types::{Cancel, Concurrency, Crash, Delay, Outcome, Severity, Time};
