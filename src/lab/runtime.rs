//! The lab host: virtual time driven explicitly by the test.
//!
//! Nothing happens until the test advances the clock. Each fired timer is
//! one step. Timers run in deadline order, and timers sharing a deadline
//! run in the order they were scheduled, so every execution is reproducible.
//!
//! ```
//! use trifuture::future::after;
//! use trifuture::lab::LabRuntime;
//! use trifuture::types::{Delay, Outcome};
//!
//! let lab = LabRuntime::default();
//! let slow = after::<_, ()>(Delay::from_millis(20), "done");
//! assert_eq!(lab.block_on(&slow), Some(Outcome::Resolve("done")));
//! assert_eq!(lab.now().as_millis(), 20);
//! ```

use super::config::LabConfig;
use crate::cx::Cx;
use crate::future::Computation;
use crate::time::{TimeSource, Timer, TimerCallback, TimerQueue, VirtualClock};
use crate::tracing_compat::{trace, warn};
use crate::types::{Outcome, Time, TimerId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

struct LabHost {
    clock: VirtualClock,
    queue: RefCell<TimerQueue>,
}

impl Timer for LabHost {
    fn now(&self) -> Time {
        self.clock.now()
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let deadline = self.clock.now() + delay;
        self.queue.borrow_mut().insert(deadline, callback)
    }

    fn clear(&self, id: TimerId) {
        self.queue.borrow_mut().cancel(id);
    }
}

/// A deterministic, virtual-time host.
pub struct LabRuntime {
    host: Rc<LabHost>,
    config: LabConfig,
    steps: Cell<u64>,
    exhausted: Cell<bool>,
}

impl LabRuntime {
    /// Creates a lab runtime with the given configuration.
    #[must_use]
    pub fn new(config: LabConfig) -> Self {
        Self {
            host: Rc::new(LabHost {
                clock: VirtualClock::starting_at(config.start),
                queue: RefCell::new(TimerQueue::new()),
            }),
            config,
            steps: Cell::new(0),
            exhausted: Cell::new(false),
        }
    }

    /// Returns a context for interpreting computations on this host.
    #[must_use]
    pub fn cx(&self) -> Cx {
        let timer: Rc<dyn Timer> = self.host.clone();
        Cx::new(timer)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &LabConfig {
        &self.config
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.host.clock.now()
    }

    /// Returns the number of timers that will still fire.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.host.queue.borrow().len()
    }

    /// Returns the number of timers fired so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    /// Returns true once the step limit stopped the runtime.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.get()
    }

    /// Advances virtual time by `delta`, firing every timer due on the way.
    ///
    /// Returns the number of timers fired.
    pub fn advance_by(&self, delta: Duration) -> usize {
        self.advance_to(self.now() + delta)
    }

    /// Advances virtual time to `target`, firing every timer due on the way.
    ///
    /// Timers scheduled by callbacks are fired too if they fall due before
    /// `target`. Returns the number of timers fired.
    pub fn advance_to(&self, target: Time) -> usize {
        let mut fired = 0;
        loop {
            let next = self.host.queue.borrow_mut().next_deadline();
            match next {
                Some(deadline) if deadline <= target => {
                    self.host.clock.advance_to(deadline);
                    if !self.fire_next_due() {
                        return fired;
                    }
                    fired += 1;
                }
                _ => break,
            }
        }
        self.host.clock.advance_to(target);
        fired
    }

    /// Advances to the earliest pending deadline and fires everything due
    /// there. Returns the number of timers fired.
    pub fn advance_to_next(&self) -> usize {
        let next = self.host.queue.borrow_mut().next_deadline();
        next.map_or(0, |deadline| self.advance_to(deadline))
    }

    /// Fires timers until none remain or the step limit is reached.
    ///
    /// Returns the number of timers fired.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        loop {
            let step = self.advance_to_next();
            if step == 0 {
                return fired;
            }
            fired += step;
        }
    }

    /// Interprets `computation` and runs the host until it settles.
    ///
    /// Returns `None` if the host went idle (or hit its step limit) first.
    pub fn block_on<T: 'static, E: 'static>(
        &self,
        computation: &Computation<T, E>,
    ) -> Option<Outcome<T, E>> {
        let slot = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        let _cancel = computation.settle(&self.cx(), move |outcome| {
            *sink.borrow_mut() = Some(outcome);
        });
        loop {
            if slot.borrow().is_some() {
                break;
            }
            if self.advance_to_next() == 0 {
                break;
            }
        }
        slot.take()
    }

    fn fire_next_due(&self) -> bool {
        if let Some(limit) = self.config.max_steps {
            if self.steps.get() >= limit {
                if !self.exhausted.replace(true) {
                    warn!(limit, now = %self.now(), "lab step limit reached");
                }
                return false;
            }
        }
        let now = self.now();
        let due = self.host.queue.borrow_mut().pop_due(now);
        let Some((id, callback)) = due else {
            return false;
        };
        self.steps.set(self.steps.get() + 1);
        trace!(timer = %id, now = %now, "timer fired");
        callback();
        true
    }
}

impl Default for LabRuntime {
    fn default() -> Self {
        Self::new(LabConfig::default())
    }
}

impl fmt::Debug for LabRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabRuntime")
            .field("now", &self.now())
            .field("pending_timers", &self.pending_timers())
            .field("steps", &self.steps())
            .finish_non_exhaustive()
    }
}
