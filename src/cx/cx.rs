//! The capability context type.

use super::trampoline::Trampoline;
use crate::runtime::event_loop::{Parked, Parking, Ticket};
use crate::time::{Timer, TimerCallback};
use crate::tracing_compat::trace;
use crate::types::{Cancel, Time, TimerId};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// The capability token an interpretation uses to reach its host.
///
/// Cloning is cheap; clones refer to the same host.
#[derive(Clone)]
pub struct Cx {
    timer: Rc<dyn Timer>,
    parking: Option<Rc<Parking>>,
    trampoline: Rc<Trampoline>,
}

impl Cx {
    /// Creates a context backed by the given timer service.
    ///
    /// Contexts created this way cannot park external callbacks.
    #[must_use]
    pub fn new(timer: Rc<dyn Timer>) -> Self {
        Self {
            timer,
            parking: None,
            trampoline: Rc::new(Trampoline::new()),
        }
    }

    pub(crate) fn with_parking(timer: Rc<dyn Timer>, parking: Rc<Parking>) -> Self {
        Self {
            timer,
            parking: Some(parking),
            trampoline: Rc::new(Trampoline::new()),
        }
    }

    /// Creates a context on a fresh virtual-time lab host.
    ///
    /// Timers scheduled through it never fire, which is enough for
    /// interpreting computations that settle synchronously.
    #[must_use]
    pub fn for_testing() -> Self {
        crate::lab::LabRuntime::default().cx()
    }

    /// Returns the host's current time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.timer.now()
    }

    /// Schedules `callback` on the host after `delay`.
    pub fn schedule(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        let callback: TimerCallback = Box::new(callback);
        let id = self.timer.schedule(delay, callback);
        trace!(timer = %id, delay = ?delay, "timer scheduled");
        id
    }

    /// Clears a timer scheduled with [`schedule`](Self::schedule).
    pub fn clear(&self, id: TimerId) {
        trace!(timer = %id, "timer cleared");
        self.timer.clear(id);
    }

    /// Returns true if the host can receive callbacks from other threads.
    #[must_use]
    pub fn can_park(&self) -> bool {
        self.parking.is_some()
    }

    /// Parks a callback on the host until the returned ticket is delivered
    /// or dropped.
    pub(crate) fn park(&self, parked: Parked) -> Option<Ticket> {
        self.parking.as_ref().map(|parking| parking.park(parked))
    }

    /// Returns a handle that drops the callback parked under `ticket`
    /// without running it, so the host no longer waits for it.
    pub(crate) fn unparker(&self, ticket: &Ticket) -> Cancel {
        let Some(parking) = &self.parking else {
            return Cancel::noop();
        };
        let parking = Rc::downgrade(parking);
        let key = ticket.key();
        Cancel::new(move || {
            if let Some(parking) = parking.upgrade() {
                parking.release(key);
            }
        })
    }

    /// Runs `job` on this context's trampoline.
    ///
    /// The job runs before the outermost bounce on this context returns, but
    /// possibly after the current call returns.
    pub(crate) fn bounce(&self, job: impl FnOnce() + 'static) {
        self.trampoline.bounce(job);
    }
}

impl fmt::Debug for Cx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cx")
            .field("now", &self.now())
            .field("can_park", &self.can_park())
            .finish()
    }
}
