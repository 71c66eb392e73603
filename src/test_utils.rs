//! Test utilities for trifuture.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Lab runtime constructors
//! - Outcome sinks and cancellation probes
//! - Outcome assertion macros
//!
//! # Example
//! ```rust,ignore
//! use trifuture::future::after;
//! use trifuture::test_utils::{cancellation_probe, init_test_logging, test_lab};
//! use trifuture::types::Delay;
//!
//! init_test_logging();
//! let (cancelled, slow) = cancellation_probe(after::<u8, ()>(Delay::from_millis(10), 1));
//! let lab = test_lab();
//! let cancel = slow.fork(&lab.cx(), |_| {}, |_| {});
//! cancel.cancel();
//! assert_eq!(cancelled.get(), 1);
//! ```

use crate::cx::Cx;
use crate::future::{Computation, Continuation, Interpret};
use crate::lab::{LabConfig, LabRuntime};
use crate::types::{Cancel, Outcome};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, Once, PoisonError};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create a lab runtime starting at time zero.
#[must_use]
pub fn test_lab() -> LabRuntime {
    LabRuntime::default()
}

/// Create a lab runtime that gives up after `steps` timer firings.
#[must_use]
pub fn test_lab_with_steps(steps: u64) -> LabRuntime {
    LabRuntime::new(LabConfig::new().max_steps(steps))
}

/// Shared record of every outcome delivered to a continuation.
pub type OutcomeLog<T, E> = Rc<RefCell<Vec<Outcome<T, E>>>>;

/// Returns a continuation that records every delivery, and the record.
///
/// Unlike [`Computation::settle`], the sink does not deduplicate, so a
/// second delivery shows up as a second entry.
pub fn outcome_sink<T: 'static, E: 'static>() -> (OutcomeLog<T, E>, Continuation<T, E>) {
    let log: OutcomeLog<T, E> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let k = Continuation::from_settle(move |outcome| sink.borrow_mut().push(outcome));
    (log, k)
}

struct Probe<T, E> {
    inner: Computation<T, E>,
    cancelled: Rc<Cell<usize>>,
}

impl<T: 'static, E: 'static> Interpret<T, E> for Probe<T, E> {
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let open = Rc::new(Cell::new(true));
        let on_crash = Rc::clone(&open);
        let on_reject = Rc::clone(&open);
        let on_resolve = Rc::clone(&open);
        let (crash_k, reject_k) = (k.clone(), k.clone());
        let handle = self.inner.interpret(
            cx,
            Continuation::new(
                move |crash| {
                    on_crash.set(false);
                    crash_k.crash(crash);
                },
                move |reason| {
                    on_reject.set(false);
                    reject_k.reject(reason);
                },
                move |value| {
                    on_resolve.set(false);
                    k.resolve(value);
                },
            ),
        );
        let cancelled = Rc::clone(&self.cancelled);
        Cancel::new(move || {
            if open.replace(false) {
                cancelled.set(cancelled.get() + 1);
                handle.cancel();
            }
        })
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// Wraps `inner` so that cancelling a still-pending session is counted.
///
/// Cancelling a session that already settled is not counted. The wrapper
/// hides the inner [`RaceHint`](crate::future::RaceHint), so races involving
/// it always run dynamically.
pub fn cancellation_probe<T: 'static, E: 'static>(
    inner: Computation<T, E>,
) -> (Rc<Cell<usize>>, Computation<T, E>) {
    let cancelled = Rc::new(Cell::new(0));
    let probe = Computation::from_interpret(Probe {
        inner,
        cancelled: Rc::clone(&cancelled),
    });
    (cancelled, probe)
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that an outcome is `Resolve` with a specific value.
#[macro_export]
macro_rules! assert_resolved {
    ($outcome:expr, $expected:expr) => {
        match $outcome {
            Some($crate::types::Outcome::Resolve(v)) => assert_eq!(v, $expected),
            other => panic!("expected Outcome::Resolve({:?}), got {:?}", $expected, other),
        }
    };
}

/// Assert that an outcome is `Reject` with a specific reason.
#[macro_export]
macro_rules! assert_rejected {
    ($outcome:expr, $expected:expr) => {
        match $outcome {
            Some($crate::types::Outcome::Reject(e)) => assert_eq!(e, $expected),
            other => panic!("expected Outcome::Reject({:?}), got {:?}", $expected, other),
        }
    };
}

/// Assert that an outcome is `Crash` and evaluate to the crash.
#[macro_export]
macro_rules! assert_crashed {
    ($outcome:expr) => {
        match $outcome {
            Some($crate::types::Outcome::Crash(crash)) => crash,
            other => panic!("expected Outcome::Crash, got {:?}", other),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::{after, never, resolve};
    use crate::types::Delay;
    use std::time::Duration;

    #[test]
    fn probe_counts_only_pending_cancellation() {
        init_test_logging();
        crate::test_phase!("probe_counts_only_pending_cancellation");
        let (cancelled, slow) = cancellation_probe(after::<u8, ()>(Delay::from_millis(10), 1));
        let lab = test_lab();

        let (seen, k) = outcome_sink();
        let cancel = slow.interpret(&lab.cx(), k);
        lab.advance_by(Duration::from_millis(10));
        cancel.cancel();
        assert_eq!(*seen.borrow(), [Outcome::Resolve(1)]);
        assert_eq!(cancelled.get(), 0);

        let (seen, k) = outcome_sink();
        let cancel = slow.interpret(&lab.cx(), k);
        cancel.cancel();
        cancel.cancel();
        lab.run_until_idle();
        assert!(seen.borrow().is_empty());
        crate::assert_with_log!(cancelled.get() == 1, "cancelled once", 1, cancelled.get());
        crate::test_complete!("probe_counts_only_pending_cancellation");
    }

    #[test]
    fn probe_keeps_the_description() {
        let (_, probe) = cancellation_probe(resolve::<u8, ()>(1));
        assert_eq!(probe.to_string(), "Future.of(..)");
    }

    #[test]
    fn step_limited_lab_gives_up() {
        let lab = test_lab_with_steps(3);
        assert!(lab.block_on(&never::<u8, ()>()).is_none());
        crate::assert_resolved!(lab.block_on(&resolve::<u8, ()>(4)), 4);
    }
}
