//! Combinators over computations.
//!
//! This module provides the core combinators:
//!
//! - [`chain`], [`chain_rej`], [`and`], [`alt`]: sequencing
//! - [`map`], [`map_rej`], [`bimap`], [`fold`], [`swap`]: synchronous
//!   transformations of a settled outcome
//! - [`chain_rec`](mod@chain_rec): stack-safe tail-recursive looping
//! - [`go`](mod@go): coroutine-style sequencing
//! - [`hook`](mod@hook): acquire/consume/dispose resource safety
//! - [`lastly`](mod@lastly): cleanup after settlement
//! - [`parallel`](mod@parallel): bounded-concurrency interpretation of many
//! - [`both`](mod@both): pairing two computations side by side
//! - [`race`](mod@race), [`timeout`]: first to settle wins
//!
//! Every combinator talks to its children only through
//! [`Interpret`](crate::future::Interpret), and every one of them
//! cancels exactly the children that are live when its own handle is
//! called.

pub mod both;
pub mod chain;
pub mod chain_rec;
pub mod go;
pub mod hook;
pub mod lastly;
pub mod parallel;
pub mod race;
mod transform;

pub use both::both;
pub use chain::{alt, and, chain, chain_rej};
pub use chain_rec::{chain_rec, Step};
pub use go::{go, Coroutine, GoStep};
pub use hook::hook;
pub use lastly::lastly;
pub use parallel::parallel;
pub use race::{race, timeout};
pub use transform::{bimap, fold, map, map_rej, swap};
