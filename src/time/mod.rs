//! Timer substrate for time-based leaves.
//!
//! Computations never own a clock. A time-based leaf reaches its host
//! through the [`Timer`] capability carried by [`Cx`](crate::cx::Cx):
//!
//! - [`LabRuntime`](crate::lab::LabRuntime): virtual time, advanced explicitly
//! - [`EventLoop`](crate::runtime::EventLoop): wall clock time
//!
//! Both hosts keep their timers in a [`TimerQueue`].

mod driver;
mod queue;

pub use driver::{TimeSource, VirtualClock, WallClock};
pub use queue::{TimerCallback, TimerQueue};

use crate::types::{Time, TimerId};
use std::time::Duration;

/// A host's timer service.
///
/// Callbacks run on the host's thread, with no host state borrowed, once the
/// host's clock reaches the deadline.
pub trait Timer {
    /// Returns the host's current time.
    fn now(&self) -> Time;

    /// Schedules `callback` to run once `delay` has elapsed.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Clears a scheduled timer. Clearing a fired or unknown timer is a no-op.
    fn clear(&self, id: TimerId);
}
