//! The timing flag behind every synchronous drain loop.
//!
//! A drain loop interprets one child per iteration. Whether the child
//! settled before its `interpret` call returned decides what happens next:
//!
//! ```text
//!              arm()
//!   ┌───────────────────────────┐
//!   ▼                           │
//! Undetermined ──settled()──► Synchronous   loop continues in place
//!   │
//!   └──returned()──► Asynchronous           loop resumes from the callback
//! ```
//!
//! The loop never recurses for synchronous children, so its stack depth is
//! bounded no matter how many steps settle synchronously.

use std::cell::Cell;

/// When a child settled relative to its `interpret` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timing {
    /// The child has neither settled nor returned from `interpret`.
    #[default]
    Undetermined,
    /// The child settled before `interpret` returned.
    Synchronous,
    /// `interpret` returned before the child settled.
    Asynchronous,
}

/// A session's timing flag.
#[derive(Debug, Default)]
pub struct TimingFlag {
    timing: Cell<Timing>,
}

impl TimingFlag {
    /// Creates an undetermined flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the flag before interpreting the next child.
    pub fn arm(&self) {
        self.timing.set(Timing::Undetermined);
    }

    /// Records that the current child settled.
    ///
    /// Returns true if the settlement arrived after `interpret` returned, in
    /// which case the caller must resume the drain loop itself.
    pub fn settled(&self) -> bool {
        match self.timing.get() {
            Timing::Undetermined => {
                self.timing.set(Timing::Synchronous);
                false
            }
            Timing::Asynchronous => true,
            Timing::Synchronous => false,
        }
    }

    /// Records that `interpret` returned.
    ///
    /// Returns true if the child already settled, in which case the drain
    /// loop continues in place.
    pub fn returned(&self) -> bool {
        if self.timing.get() == Timing::Synchronous {
            true
        } else {
            self.timing.set(Timing::Asynchronous);
            false
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn get(&self) -> Timing {
        self.timing.get()
    }
}
