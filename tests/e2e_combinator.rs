//! End-to-end combinator scenarios on the lab host.
//!
//! Each test builds a computation from the public API, interprets it on a
//! virtual-time host and checks the outcome together with the side effects
//! observed on tracked leaves (starts, cancellations, timer firings).

#[macro_use]
mod common;

use common::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use trifuture::combinator::{both, chain_rec, go, hook, parallel, race, GoStep, Step};
use trifuture::future::{after, never, node, reject, reject_after, resolve, Computation};
use trifuture::runtime::EventLoop;
use trifuture::types::{Cancel, Concurrency, Delay, Outcome};

fn limited(n: usize) -> Concurrency {
    Concurrency::limited(n).expect("positive limit")
}

#[test]
fn parallel_preserves_order_and_limit() {
    init_test_logging();
    test_phase!("parallel_preserves_order_and_limit");
    let tracker = Rc::new(Tracker::default());
    let children = ['a', 'b', 'c', 'd', 'e']
        .into_iter()
        .map(|x| tracked_after::<_, ()>(&tracker, 20, x))
        .collect();
    let m = parallel(limited(2), children);
    let lab = test_lab();

    assert_resolved!(lab.block_on(&m), vec!['a', 'b', 'c', 'd', 'e']);
    assert_with_log!(tracker.peak.get() == 2, "peak concurrency", 2, tracker.peak.get());
    assert_eq!(tracker.started.get(), 5);
    assert_eq!(lab.now().as_millis(), 60);
    test_complete!("parallel_preserves_order_and_limit", elapsed_ms = lab.now().as_millis());
}

#[test]
fn parallel_rejection_short_circuits() {
    init_test_logging();
    test_phase!("parallel_rejection_short_circuits");
    let tracker = Rc::new(Tracker::default());
    let m = parallel(
        limited(2),
        vec![
            tracked_reject_after(&tracker, 10, 'x'),
            tracked_after(&tracker, 1000, 'y'),
        ],
    );
    let lab = test_lab();

    assert_rejected!(lab.block_on(&m), 'x');
    assert_with_log!(
        tracker.cancelled.get() == 1,
        "second child cancelled",
        1,
        tracker.cancelled.get()
    );
    assert_eq!(lab.now().as_millis(), 10);
    assert_eq!(lab.pending_timers(), 0);
    lab.run_until_idle();
    assert_eq!(tracker.fired.get(), 1);
    test_complete!("parallel_rejection_short_circuits");
}

#[test]
fn long_synchronous_chains_are_stack_safe() {
    init_test_logging();
    test_phase!("long_synchronous_chains_are_stack_safe");
    fn count_to(n: u64, limit: u64) -> Computation<u64, ()> {
        if n == limit {
            resolve(n)
        } else {
            resolve(n).chain(move |x| count_to(x + 1, limit))
        }
    }
    let lab = test_lab();
    assert_resolved!(lab.block_on(&count_to(0, 10_000)), 10_000);

    let looped = chain_rec(
        |n: u64| resolve::<_, ()>(if n == 10_000 { Step::Done(n) } else { Step::Next(n + 1) }),
        0,
    );
    assert_resolved!(lab.block_on(&looped), 10_000);
    test_complete!("long_synchronous_chains_are_stack_safe");
}

fn add_two() -> Computation<u32, ()> {
    go(|| {
        let mut a = None;
        move |input: Option<u32>| match (a, input) {
            (None, None) => GoStep::Yield(after(Delay::from_millis(5), 1)),
            (None, Some(x)) => {
                a = Some(x);
                GoStep::Yield(resolve(2))
            }
            (Some(a), b) => GoStep::Return(a + b.unwrap_or_default()),
        }
    })
}

#[test]
fn go_sessions_are_independent() {
    init_test_logging();
    test_phase!("go_sessions_are_independent");
    let m = add_two();
    let lab = test_lab();
    let (first, k1) = outcome_sink();
    let (second, k2) = outcome_sink();
    m.interpret(&lab.cx(), k1);
    m.interpret(&lab.cx(), k2);
    lab.run_until_idle();

    assert_eq!(*first.borrow(), [Outcome::Resolve(3)]);
    assert_eq!(*second.borrow(), [Outcome::Resolve(3)]);
    assert_resolved!(lab.block_on(&m), 3);
    test_complete!("go_sessions_are_independent");
}

/// A hook whose acquisition and disposal are recorded in `log`.
fn logged_hook(
    log: &Rc<RefCell<Vec<&'static str>>>,
    consume: Computation<u8, &'static str>,
) -> Computation<u8, &'static str> {
    let acquired = Rc::clone(log);
    let disposed = Rc::clone(log);
    let acquire = resolve::<&'static str, &'static str>("conn").map(move |r| {
        acquired.borrow_mut().push("acquire");
        r
    });
    hook(
        acquire,
        move |_| {
            let disposed = Rc::clone(&disposed);
            after(Delay::from_millis(3), ()).map(move |()| disposed.borrow_mut().push("dispose"))
        },
        move |_| consume.clone(),
    )
}

#[test]
fn hook_disposes_exactly_once() {
    init_test_logging();
    test_phase!("hook_disposes_exactly_once");
    let lab = test_lab();

    test_section!("resolve");
    let log = Rc::new(RefCell::new(Vec::new()));
    assert_resolved!(lab.block_on(&logged_hook(&log, after(Delay::from_millis(5), 1))), 1);
    assert_eq!(*log.borrow(), ["acquire", "dispose"]);

    test_section!("reject");
    let log = Rc::new(RefCell::new(Vec::new()));
    assert_rejected!(lab.block_on(&logged_hook(&log, reject("used"))), "used");
    assert_eq!(*log.borrow(), ["acquire", "dispose"]);

    test_section!("cancel");
    let log = Rc::new(RefCell::new(Vec::new()));
    let m = logged_hook(&log, never());
    let (seen, k) = outcome_sink();
    let cancel = m.interpret(&lab.cx(), k);
    lab.advance_by(Duration::from_millis(1));
    cancel.cancel();
    cancel.cancel();
    lab.run_until_idle();
    assert_eq!(*log.borrow(), ["acquire", "dispose"]);
    assert!(seen.borrow().is_empty());
    test_complete!("hook_disposes_exactly_once");
}

#[test]
fn race_prefers_the_shorter_timer_and_cancels_the_loser() {
    init_test_logging();
    test_phase!("race_prefers_the_shorter_timer_and_cancels_the_loser");
    let lab = test_lab();
    let m = race(
        after::<_, ()>(Delay::from_millis(10), 'a'),
        after(Delay::from_millis(20), 'b'),
    );
    assert_resolved!(lab.block_on(&m), 'a');

    let tracker = Rc::new(Tracker::default());
    let m = race(
        tracked_after::<_, ()>(&tracker, 10, 'a'),
        tracked_after(&tracker, 20, 'b'),
    );
    assert_resolved!(lab.block_on(&m), 'a');
    assert_with_log!(tracker.cancelled.get() == 1, "loser cancelled", 1, tracker.cancelled.get());
    assert_eq!(tracker.fired.get(), 1);
    test_complete!("race_prefers_the_shorter_timer_and_cancels_the_loser");
}

#[test]
fn both_fails_fast() {
    init_test_logging();
    let tracker = Rc::new(Tracker::default());
    let m = both(
        tracked_after::<u8, &str>(&tracker, 50, 1),
        tracked_reject_after::<u8, _>(&tracker, 5, "nope"),
    );
    let lab = test_lab();
    assert_rejected!(lab.block_on(&m), "nope");
    assert_eq!(tracker.cancelled.get(), 1);
    assert_eq!(lab.now().as_millis(), 5);
}

#[test]
fn cancellation_is_idempotent_everywhere() {
    init_test_logging();
    test_phase!("cancellation_is_idempotent_everywhere");
    let tracker = Rc::new(Tracker::default());
    let composites: Vec<Computation<u8, ()>> = vec![
        tracked_after(&tracker, 10, 1).chain(|x| after(Delay::from_millis(1), x)),
        parallel(limited(1), vec![tracked_after(&tracker, 10, 1)]).map(|v| v[0]),
        both(tracked_after(&tracker, 10, 1), tracked_after(&tracker, 10, 2)).map(|(a, b)| a + b),
        race(tracked_after(&tracker, 10, 1), tracked_after(&tracker, 20, 2)),
    ];
    let lab = test_lab();
    for m in &composites {
        let (seen, k) = outcome_sink();
        let cancel = m.interpret(&lab.cx(), k);
        cancel.cancel();
        cancel.cancel();
        lab.run_until_idle();
        assert!(seen.borrow().is_empty(), "{m} delivered after cancel");
    }
    assert_eq!(tracker.started.get(), tracker.cancelled.get());
    assert_eq!(tracker.fired.get(), 0);
    test_complete!("cancellation_is_idempotent_everywhere", started = tracker.started.get());
}

#[test]
fn crash_trail_reads_outward() {
    init_test_logging();
    let boom = Computation::<u8, ()>::new(|_, _| panic!("boom"));
    let m = parallel(limited(2), vec![resolve(1), boom]).chain(|v| resolve(v[0]));
    let crash = assert_crashed!(test_lab().block_on(&m));
    assert_eq!(crash.message(), "boom");
    assert_eq!(
        crash.phases().collect::<Vec<_>>(),
        [
            "Future was executing its computation",
            "Future.parallel was running the second future"
        ]
    );
}

#[test]
fn node_completes_from_another_thread() {
    init_test_logging();
    test_phase!("node_completes_from_another_thread");
    let m = node(|cx, done: trifuture::future::NodeDone<u32, String>| {
        if let Some(remote) = done.into_remote(cx) {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                remote.complete(Ok(7));
            });
        }
    });
    let event_loop = EventLoop::new();
    assert_resolved!(event_loop.block_on(&m), 7);
    assert_eq!(event_loop.parked(), 0);
    test_complete!("node_completes_from_another_thread");
}

#[test]
fn event_loop_runs_timers_on_the_wall_clock() {
    init_test_logging();
    let m = race(
        after::<_, ()>(Delay::from_millis(30), "slow"),
        reject_after(Delay::from_millis(5), ()).chain_rej(|()| after(Delay::from_millis(1), "fast")),
    );
    let event_loop = EventLoop::new();
    assert_resolved!(event_loop.block_on(&m), "fast");
    assert_eq!(event_loop.pending_timers(), 0);
}

#[test]
fn computation_new_observes_cancel_once() {
    let stops = Rc::new(Cell::new(0));
    let count = Rc::clone(&stops);
    let m = Computation::<u8, ()>::new(move |_, _| {
        let count = Rc::clone(&count);
        Cancel::new(move || count.set(count.get() + 1))
    });
    let lab = test_lab();
    let cancel = m.interpret(&lab.cx(), outcome_sink().1);
    cancel.cancel();
    cancel.cancel();
    assert_eq!(stops.get(), 1);
}
