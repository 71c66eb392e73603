//! The computation type, its interpretation contract, and the leaves.
//!
//! - [`Computation`] / [`Interpret`] / [`Continuation`]: the contract
//! - leaves: [`resolve`], [`reject`], [`never`], [`after`],
//!   [`reject_after`], [`attempt`], [`encase`], [`Computation::new`]
//! - [`node`]: callback-style effects, optionally completed from another
//!   thread through [`RemoteDone`]
//! - [`TimingFlag`]: the synchronous-settlement detector shared by every
//!   drain loop in [`combinator`](crate::combinator)

mod adapter;
mod computation;
mod leaf;
mod timing;

pub use adapter::{node, NodeDone, RemoteDone};
pub use computation::{Computation, Continuation, Interpret, RaceHint, Resolver};
pub use leaf::{after, attempt, encase, never, reject, reject_after, resolve};
pub use timing::{Timing, TimingFlag};
