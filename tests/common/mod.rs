#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use trifuture::future::{Computation, Continuation};
use trifuture::lab::{LabConfig, LabRuntime};
use trifuture::types::{Cancel, Outcome};

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "TRIFUTURE_PROPTEST_SEED";
const PROPTEST_MAX_SHRINK_ITERS_ENV: &str = "TRIFUTURE_PROPTEST_MAX_SHRINK_ITERS";

/// Configuration for property tests with optional deterministic seed support.
#[derive(Debug, Clone)]
pub struct PropertyTestConfig {
    /// Fixed seed for reproducibility (overrides CI default when set).
    pub seed: Option<u64>,
    /// Number of successful cases required.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropertyTestConfig {
    /// Build a config with defaults for property tests.
    #[must_use]
    pub fn new(cases: u32) -> Self {
        Self {
            seed: read_proptest_seed(),
            cases,
            max_shrink_iters: read_max_shrink_iters()
                .unwrap_or(ProptestConfig::default().max_shrink_iters),
        }
    }

    /// Convert into a ProptestConfig, applying deterministic seed rules.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        let mut config = ProptestConfig::with_cases(self.cases);

        // Honor existing PROPTEST_RNG_SEED, otherwise apply our own.
        if matches!(config.rng_seed, RngSeed::Random) {
            if let Some(seed) = self.seed {
                config.rng_seed = RngSeed::Fixed(seed);
            }
        }

        config.max_shrink_iters = self.max_shrink_iters;
        config
    }
}

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    PropertyTestConfig::new(cases).to_proptest_config()
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }

    // If CI is set and no explicit seed is provided, use a fixed seed.
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }

    None
}

fn read_max_shrink_iters() -> Option<u32> {
    std::env::var(PROPTEST_MAX_SHRINK_ITERS_ENV)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
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

/// Create a deterministic lab runtime for testing.
#[must_use]
pub fn test_lab() -> LabRuntime {
    LabRuntime::new(LabConfig::new())
}

/// Every outcome a sink has received, in delivery order.
pub type OutcomeLog<T, E> = Rc<RefCell<Vec<Outcome<T, E>>>>;

/// Returns a continuation that records every delivery, and the record.
pub fn outcome_sink<T: 'static, E: 'static>() -> (OutcomeLog<T, E>, Continuation<T, E>) {
    let log: OutcomeLog<T, E> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    (
        log,
        Continuation::from_settle(move |outcome| sink.borrow_mut().push(outcome)),
    )
}

/// Side effects observed on a [`tracked_after`] leaf.
#[derive(Debug, Default)]
pub struct Tracker {
    /// Sessions started.
    pub started: Cell<usize>,
    /// Sessions cancelled while their timer was pending.
    pub cancelled: Cell<usize>,
    /// Sessions whose timer fired.
    pub fired: Cell<usize>,
    /// Sessions running right now.
    pub running: Cell<usize>,
    /// Most sessions ever running at once.
    pub peak: Cell<usize>,
}

impl Tracker {
    fn enter(&self) {
        self.started.set(self.started.get() + 1);
        self.running.set(self.running.get() + 1);
        self.peak.set(self.peak.get().max(self.running.get()));
    }

    fn leave(&self) {
        self.running.set(self.running.get() - 1);
    }
}

/// A timer leaf resolving with `value` after `millis`, recording its side
/// effects in `tracker`.
pub fn tracked_after<T, E>(tracker: &Rc<Tracker>, millis: u64, value: T) -> Computation<T, E>
where
    T: Clone + 'static,
    E: 'static,
{
    let tracker = Rc::clone(tracker);
    Computation::new(move |cx, resolver| {
        tracker.enter();
        let value = value.clone();
        let fired = Rc::clone(&tracker);
        let id = cx.schedule(Duration::from_millis(millis), move || {
            fired.fired.set(fired.fired.get() + 1);
            fired.leave();
            resolver.resolve(value);
        });
        let cx = cx.clone();
        let cancelled = Rc::clone(&tracker);
        Cancel::new(move || {
            cancelled.cancelled.set(cancelled.cancelled.get() + 1);
            cancelled.leave();
            cx.clear(id);
        })
    })
}

/// A timer leaf rejecting with `reason` after `millis`, recording its side
/// effects in `tracker`.
pub fn tracked_reject_after<T, E>(tracker: &Rc<Tracker>, millis: u64, reason: E) -> Computation<T, E>
where
    T: 'static,
    E: Clone + 'static,
{
    let tracker = Rc::clone(tracker);
    Computation::new(move |cx, resolver| {
        tracker.enter();
        let reason = reason.clone();
        let fired = Rc::clone(&tracker);
        let id = cx.schedule(Duration::from_millis(millis), move || {
            fired.fired.set(fired.fired.get() + 1);
            fired.leave();
            resolver.reject(reason);
        });
        let cx = cx.clone();
        let cancelled = Rc::clone(&tracker);
        Cancel::new(move || {
            cancelled.cancelled.set(cancelled.cancelled.get() + 1);
            cancelled.leave();
            cx.clear(id);
        })
    })
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
            Some(::trifuture::types::Outcome::Resolve(v)) => assert_eq!(v, $expected),
            other => panic!("expected Outcome::Resolve({:?}), got {:?}", $expected, other),
        }
    };
}

/// Assert that an outcome is `Reject` with a specific reason.
#[macro_export]
macro_rules! assert_rejected {
    ($outcome:expr, $expected:expr) => {
        match $outcome {
            Some(::trifuture::types::Outcome::Reject(e)) => assert_eq!(e, $expected),
            other => panic!("expected Outcome::Reject({:?}), got {:?}", $expected, other),
        }
    };
}

/// Assert that an outcome is `Crash` and evaluate to the crash.
#[macro_export]
macro_rules! assert_crashed {
    ($outcome:expr) => {
        match $outcome {
            Some(::trifuture::types::Outcome::Crash(crash)) => crash,
            other => panic!("expected Outcome::Crash, got {:?}", other),
        }
    };
}
