//! Tail-recursive looping over computations.
//!
//! `chain_rec(step, init)` calls `step(state)` to obtain a computation of a
//! [`Step`]. `Step::Next(state)` loops again with the new state,
//! `Step::Done(value)` resolves the session.
//!
//! The loop is driven by a [`TimingFlag`]: a step that settles before its
//! `interpret` returns is picked up by the loop in place, and one that
//! settles later resumes the loop from its continuation. The stack depth
//! therefore stays constant however many steps settle synchronously.

use crate::cx::Cx;
use crate::future::{Computation, Continuation, Interpret, TimingFlag};
use crate::tracing_compat::trace;
use crate::types::{catch, Cancel, CancelSlot};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// The result of one step of a [`chain_rec`] loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<S, T> {
    /// Loop again with a new state.
    Next(S),
    /// Stop with the final value.
    Done(T),
}

struct ChainRec<S, F> {
    step: Rc<F>,
    init: S,
}

struct RecSession<S, T, E, F> {
    step: Rc<F>,
    cx: Cx,
    k: Continuation<T, E>,
    timing: TimingFlag,
    state: RefCell<Option<S>>,
    slot: Rc<CancelSlot>,
    finished: Cell<bool>,
    iterations: Cell<u64>,
}

impl<S, T, E, F> RecSession<S, T, E, F>
where
    S: 'static,
    T: 'static,
    E: 'static,
    F: Fn(S) -> Computation<Step<S, T>, E> + 'static,
{
    fn drain(self: &Rc<Self>) {
        loop {
            if self.slot.is_cancelled() {
                return;
            }
            let Some(state) = self.state.borrow_mut().take() else {
                return;
            };
            self.iterations.set(self.iterations.get() + 1);
            let step = Rc::clone(&self.step);
            let m = match catch(|| step(state)) {
                Ok(m) => m,
                Err(crash) => {
                    self.finish();
                    self.k
                        .crash(crash.context("Future.chainRec was calling its iterator"));
                    return;
                }
            };

            self.timing.arm();
            let handle = m.interpret(&self.cx, self.continuation());
            if !self.finished.get() {
                self.slot.set(handle);
            }
            if !self.timing.returned() {
                return;
            }
        }
    }

    fn continuation(self: &Rc<Self>) -> Continuation<Step<S, T>, E> {
        let on_crash = Rc::clone(self);
        let on_reject = Rc::clone(self);
        let on_resolve = Rc::clone(self);
        Continuation::new(
            move |crash| {
                on_crash.finish();
                on_crash.k.crash(crash);
            },
            move |reason| {
                on_reject.finish();
                on_reject.k.reject(reason);
            },
            move |step| on_resolve.stepped(step),
        )
    }

    fn stepped(self: &Rc<Self>, step: Step<S, T>) {
        match step {
            Step::Done(value) => {
                self.finish();
                trace!(iterations = self.iterations.get(), "Future.chainRec done");
                self.k.resolve(value);
            }
            Step::Next(state) => {
                *self.state.borrow_mut() = Some(state);
                if self.timing.settled() {
                    self.drain();
                }
            }
        }
    }

    fn finish(&self) {
        self.finished.set(true);
        self.slot.clear();
    }
}

impl<S, T, E, F> Interpret<T, E> for ChainRec<S, F>
where
    S: Clone + 'static,
    T: 'static,
    E: 'static,
    F: Fn(S) -> Computation<Step<S, T>, E> + 'static,
{
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let session = Rc::new(RecSession {
            step: Rc::clone(&self.step),
            cx: cx.clone(),
            k,
            timing: TimingFlag::new(),
            state: RefCell::new(Some(self.init.clone())),
            slot: Rc::new(CancelSlot::new()),
            finished: Cell::new(false),
            iterations: Cell::new(0),
        });
        session.drain();
        CancelSlot::handle(&session.slot)
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Future.chainRec(..)")
    }
}

/// Loops `step` from `init` until it produces [`Step::Done`].
///
/// A rejection or crash of any step ends the loop with that outcome. A panic
/// in `step` is a crash.
///
/// ```
/// use trifuture::combinator::{chain_rec, Step};
/// use trifuture::future::resolve;
/// use trifuture::lab::LabRuntime;
/// use trifuture::types::Outcome;
///
/// let sum = chain_rec(
///     |(i, acc): (u64, u64)| {
///         resolve::<_, ()>(if i == 0 { Step::Done(acc) } else { Step::Next((i - 1, acc + i)) })
///     },
///     (100, 0),
/// );
/// assert_eq!(LabRuntime::default().block_on(&sum), Some(Outcome::Resolve(5050)));
/// ```
pub fn chain_rec<S, T, E, F>(step: F, init: S) -> Computation<T, E>
where
    S: Clone + 'static,
    T: 'static,
    E: 'static,
    F: Fn(S) -> Computation<Step<S, T>, E> + 'static,
{
    Computation::from_interpret(ChainRec {
        step: Rc::new(step),
        init,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::{after, reject, resolve};
    use crate::test_utils::{cancellation_probe, outcome_sink, test_lab};
    use crate::types::{Delay, Outcome};
    use std::time::Duration;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn synchronous_steps_are_stack_safe() {
        init_test("synchronous_steps_are_stack_safe");
        let m = chain_rec(
            |n: u64| resolve::<_, ()>(if n == 100_000 { Step::Done(n) } else { Step::Next(n + 1) }),
            0,
        );
        let lab = test_lab();
        assert_eq!(lab.block_on(&m), Some(Outcome::Resolve(100_000)));
        crate::test_complete!("synchronous_steps_are_stack_safe");
    }

    #[test]
    fn mixes_synchronous_and_asynchronous_steps() {
        let m = chain_rec(
            |n: u32| {
                let next = if n == 10 { Step::Done(n) } else { Step::Next(n + 1) };
                if n % 3 == 0 {
                    after::<_, ()>(Delay::from_millis(1), next)
                } else {
                    resolve(next)
                }
            },
            0,
        );
        let lab = test_lab();
        assert_eq!(lab.block_on(&m), Some(Outcome::Resolve(10)));
        assert_eq!(lab.now().as_millis(), 4);
    }

    #[test]
    fn rejections_end_the_loop() {
        let m = chain_rec(
            |n: u32| {
                if n == 3 {
                    reject("three")
                } else {
                    resolve(Step::<u32, u32>::Next(n + 1))
                }
            },
            0,
        );
        assert_eq!(test_lab().block_on(&m), Some(Outcome::Reject("three")));
    }

    #[test]
    fn panics_in_step_are_crashes() {
        let m = chain_rec(
            |n: u32| -> Computation<Step<u32, u32>, ()> {
                assert!(n < 2, "step exploded");
                resolve(Step::Next(n + 1))
            },
            0,
        );
        let crash = test_lab()
            .block_on(&m)
            .and_then(Outcome::crashed)
            .expect("crash");
        assert_eq!(crash.message(), "step exploded");
        assert_eq!(
            crash.phases().collect::<Vec<_>>(),
            ["Future.chainRec was calling its iterator"]
        );
    }

    #[test]
    fn cancel_stops_the_active_step() {
        let (cancelled, slow) =
            cancellation_probe(after::<Step<u32, u32>, ()>(Delay::from_millis(10), Step::Next(1)));
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let m = chain_rec(
            move |_: u32| {
                counter.set(counter.get() + 1);
                slow.clone()
            },
            0,
        );
        let lab = test_lab();
        let (seen, k) = outcome_sink();
        let cancel = m.interpret(&lab.cx(), k);
        lab.advance_by(Duration::from_millis(15));
        cancel.cancel();
        cancel.cancel();
        lab.run_until_idle();

        assert_eq!(calls.get(), 2);
        assert_eq!(cancelled.get(), 1);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn sessions_are_independent() {
        let m = chain_rec(
            |n: u8| after::<_, ()>(Delay::from_millis(2), if n == 2 { Step::Done(n) } else { Step::Next(n + 1) }),
            0,
        );
        let lab = test_lab();
        let (first, k1) = outcome_sink();
        let (second, k2) = outcome_sink();
        m.interpret(&lab.cx(), k1);
        lab.advance_by(Duration::from_millis(1));
        m.interpret(&lab.cx(), k2);
        lab.run_until_idle();
        assert_eq!(*first.borrow(), [Outcome::Resolve(2)]);
        assert_eq!(*second.borrow(), [Outcome::Resolve(2)]);
    }
}
