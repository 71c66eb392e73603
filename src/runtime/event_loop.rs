//! The wall-clock host: a single-threaded event loop.
//!
//! The loop owns a [`TimerQueue`] keyed by wall clock time and an `mpsc`
//! channel through which other threads reach it:
//!
//! - [`Remote::run`] injects a `Send` closure to run on the loop thread
//! - a [`Ticket`] delivers the payload of a parked callback (see
//!   [`NodeDone::into_remote`](crate::future::NodeDone::into_remote)), or
//!   abandons it when dropped undelivered
//!
//! When nothing is due the loop sleeps on the channel with `recv_timeout`
//! until the next deadline (capped by
//! [`max_idle_wait`](EventLoopConfig::max_idle_wait)). It goes idle once no
//! timer is pending and no parked callback is outstanding. Closures sent
//! through a [`Remote`] after the loop went idle run on its next turn.

use super::config::EventLoopConfig;
use crate::cx::Cx;
use crate::error::InvalidArgument;
use crate::future::Computation;
use crate::time::{TimeSource, Timer, TimerCallback, TimerQueue, WallClock};
use crate::tracing_compat::{debug, error, trace, warn};
use crate::types::{catch, Outcome, Time, TimerId};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// A value handed from another thread to a parked callback.
pub(crate) type Payload = Box<dyn Any + Send>;

/// A callback parked on the loop until its ticket is delivered.
pub(crate) type Parked = Box<dyn FnOnce(Payload)>;

enum Envelope {
    Run(Box<dyn FnOnce() + Send>),
    Deliver { key: u64, payload: Payload },
    Abandon(u64),
}

/// Callbacks waiting for a payload from another thread.
pub(crate) struct Parking {
    parked: RefCell<HashMap<u64, Parked>>,
    next_key: Cell<u64>,
    tx: Sender<Envelope>,
}

impl Parking {
    pub(crate) fn park(&self, parked: Parked) -> Ticket {
        let key = self.next_key.get();
        self.next_key.set(key + 1);
        self.parked.borrow_mut().insert(key, parked);
        trace!(key, "callback parked");
        Ticket {
            key,
            tx: self.tx.clone(),
            delivered: false,
        }
    }

    fn len(&self) -> usize {
        self.parked.borrow().len()
    }

    fn take(&self, key: u64) -> Option<Parked> {
        self.parked.borrow_mut().remove(&key)
    }

    /// Drops the callback parked under `key` without running it. A later
    /// delivery or abandonment of its ticket is ignored.
    pub(crate) fn release(&self, key: u64) {
        if self.take(key).is_some() {
            debug!(key, "parked callback released");
        }
    }
}

/// The right to complete one parked callback, from any thread.
///
/// Dropping a ticket without delivering it releases the parked callback
/// without running it.
pub(crate) struct Ticket {
    key: u64,
    tx: Sender<Envelope>,
    delivered: bool,
}

impl Ticket {
    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    pub(crate) fn deliver(mut self, payload: Payload) {
        self.delivered = true;
        // A closed channel means the loop is gone; nobody is left to notify.
        let _ = self.tx.send(Envelope::Deliver {
            key: self.key,
            payload,
        });
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.delivered {
            let _ = self.tx.send(Envelope::Abandon(self.key));
        }
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket").field("key", &self.key).finish()
    }
}

/// A `Send` handle for injecting work into an [`EventLoop`].
#[derive(Clone)]
pub struct Remote {
    tx: Sender<Envelope>,
}

impl Remote {
    /// Sends `f` to run on the loop thread.
    ///
    /// Returns false if the loop has been dropped.
    pub fn run(&self, f: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Envelope::Run(Box::new(f))).is_ok()
    }
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote").finish_non_exhaustive()
    }
}

struct LoopHost {
    clock: WallClock,
    queue: RefCell<TimerQueue>,
}

impl Timer for LoopHost {
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

/// A single-threaded, wall-clock host.
pub struct EventLoop {
    host: Rc<LoopHost>,
    parking: Rc<Parking>,
    rx: Receiver<Envelope>,
    config: EventLoopConfig,
    steps: Cell<u64>,
}

impl EventLoop {
    /// Creates an event loop with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(EventLoopConfig::default())
    }

    /// Creates an event loop with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if the configuration does not validate.
    pub fn with_config(config: EventLoopConfig) -> Result<Self, InvalidArgument> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EventLoopConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            host: Rc::new(LoopHost {
                clock: WallClock::new(),
                queue: RefCell::new(TimerQueue::new()),
            }),
            parking: Rc::new(Parking {
                parked: RefCell::new(HashMap::new()),
                next_key: Cell::new(0),
                tx,
            }),
            rx,
            config,
            steps: Cell::new(0),
        }
    }

    /// Returns a context for interpreting computations on this loop.
    #[must_use]
    pub fn cx(&self) -> Cx {
        let timer: Rc<dyn Timer> = self.host.clone();
        Cx::with_parking(timer, Rc::clone(&self.parking))
    }

    /// Returns a handle other threads can use to reach this loop.
    #[must_use]
    pub fn remote(&self) -> Remote {
        Remote {
            tx: self.parking.tx.clone(),
        }
    }

    /// Returns the time elapsed since the loop was created.
    #[must_use]
    pub fn now(&self) -> Time {
        self.host.clock.now()
    }

    /// Returns the number of timers that will still fire.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.host.queue.borrow().len()
    }

    /// Returns the number of parked callbacks awaiting another thread.
    #[must_use]
    pub fn parked(&self) -> usize {
        self.parking.len()
    }

    /// Returns the number of steps taken so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    /// Runs until no timer is pending and no parked callback is outstanding.
    ///
    /// Returns the number of steps taken during this call.
    pub fn run(&self) -> u64 {
        let start = self.steps.get();
        while self.turn() {}
        self.steps.get() - start
    }

    /// Interprets `computation` and runs the loop until it settles.
    ///
    /// Returns `None` if the loop went idle (or hit its step limit) first.
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
            if !self.turn() {
                break;
            }
        }
        slot.take()
    }

    /// Performs one turn of the loop. Returns false once the loop is idle.
    fn turn(&self) -> bool {
        if self.limit_reached() {
            return false;
        }
        let mut progressed = self.drain_messages();
        progressed |= self.fire_due() > 0;
        if progressed {
            return true;
        }

        let next = self.host.queue.borrow_mut().next_deadline();
        if next.is_none() && self.parking.len() == 0 {
            // Catch closures sent while we were deciding to stop.
            return self.drain_messages();
        }

        let wait = next.map_or(self.config.max_idle_wait, |deadline| {
            deadline
                .duration_since(self.now())
                .min(self.config.max_idle_wait)
        });
        match self.rx.recv_timeout(wait) {
            Ok(envelope) => self.dispatch(envelope),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("remote channel disconnected");
            }
        }
        true
    }

    fn limit_reached(&self) -> bool {
        match self.config.max_steps {
            Some(limit) if self.steps.get() >= limit => {
                warn!(limit, "event loop step limit reached");
                true
            }
            _ => false,
        }
    }

    fn drain_messages(&self) -> bool {
        let mut any = false;
        while let Ok(envelope) = self.rx.try_recv() {
            self.dispatch(envelope);
            any = true;
            if self.limit_reached() {
                break;
            }
        }
        any
    }

    fn fire_due(&self) -> usize {
        let mut fired = 0;
        loop {
            if self.limit_reached() {
                return fired;
            }
            let now = self.now();
            let due = self.host.queue.borrow_mut().pop_due(now);
            let Some((id, callback)) = due else {
                return fired;
            };
            self.steps.set(self.steps.get() + 1);
            trace!(timer = %id, now = %now, "timer fired");
            callback();
            fired += 1;
        }
    }

    fn dispatch(&self, envelope: Envelope) {
        self.steps.set(self.steps.get() + 1);
        match envelope {
            Envelope::Run(f) => {
                if let Err(crash) = catch(f) {
                    error!(crash = %crash, "remote closure panicked");
                }
            }
            Envelope::Deliver { key, payload } => {
                if let Some(parked) = self.parking.take(key) {
                    trace!(key, "parked callback delivered");
                    parked(payload);
                }
            }
            Envelope::Abandon(key) => {
                if self.parking.take(key).is_some() {
                    debug!(key, "parked callback abandoned");
                }
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now())
            .field("pending_timers", &self.pending_timers())
            .field("parked", &self.parked())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn fires_timers_in_order_then_goes_idle() {
        init_test("fires_timers_in_order_then_goes_idle");
        let event_loop = EventLoop::new();
        let cx = event_loop.cx();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, name) in [(6, "b"), (2, "a")] {
            let sink = Rc::clone(&log);
            cx.schedule(Duration::from_millis(delay), move || sink.borrow_mut().push(name));
        }

        let steps = event_loop.run();
        crate::assert_with_log!(steps == 2, "two timers fired", 2, steps);
        assert_eq!(*log.borrow(), ["a", "b"]);
        assert!(event_loop.now() >= Time::from_millis(6));
        crate::test_complete!("fires_timers_in_order_then_goes_idle");
    }

    #[test]
    fn remote_closures_run_on_the_loop() {
        init_test("remote_closures_run_on_the_loop");
        let event_loop = EventLoop::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        assert!(event_loop
            .remote()
            .run(move || flag.store(true, Ordering::SeqCst)));

        event_loop.run();
        assert!(ran.load(Ordering::SeqCst));
        crate::test_complete!("remote_closures_run_on_the_loop");
    }

    #[test]
    fn parked_callbacks_keep_the_loop_alive() {
        init_test("parked_callbacks_keep_the_loop_alive");
        let event_loop = EventLoop::new();
        let got = Rc::new(Cell::new(0u32));
        let sink = Rc::clone(&got);
        let ticket = event_loop
            .cx()
            .park(Box::new(move |payload: Payload| {
                if let Ok(value) = payload.downcast::<u32>() {
                    sink.set(*value);
                }
            }))
            .expect("event loop contexts can park");
        assert_eq!(event_loop.parked(), 1);

        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            ticket.deliver(Box::new(7u32));
        });
        event_loop.run();
        worker.join().expect("worker thread");

        assert_eq!(got.get(), 7);
        assert_eq!(event_loop.parked(), 0);
        crate::test_complete!("parked_callbacks_keep_the_loop_alive");
    }

    #[test]
    fn dropped_tickets_release_the_loop() {
        init_test("dropped_tickets_release_the_loop");
        let event_loop = EventLoop::new();
        let ticket = event_loop
            .cx()
            .park(Box::new(|_| panic!("abandoned callbacks never run")))
            .expect("event loop contexts can park");
        thread::spawn(move || drop(ticket))
            .join()
            .expect("worker thread");

        event_loop.run();
        assert_eq!(event_loop.parked(), 0);
        crate::test_complete!("dropped_tickets_release_the_loop");
    }

    #[test]
    fn step_limit_stops_the_loop() {
        init_test("step_limit_stops_the_loop");
        let config = EventLoopConfig::new().max_steps(2);
        let event_loop = EventLoop::with_config(config).expect("valid config");
        let cx = event_loop.cx();
        for _ in 0..5 {
            cx.schedule(Duration::ZERO, || {});
        }
        assert_eq!(event_loop.run(), 2);
        assert_eq!(event_loop.pending_timers(), 3);
        crate::test_complete!("step_limit_stops_the_loop");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EventLoopConfig::new().max_idle_wait(Duration::ZERO);
        assert!(EventLoop::with_config(config).is_err());
    }
}
