//! Coroutine-style sequencing.
//!
//! `go(spawn)` calls `spawn()` once per session to obtain a fresh
//! [`Coroutine`], then drives it: each [`resume`](Coroutine::resume) either
//! yields a computation to interpret next or returns the final value. The
//! value of each yielded computation is passed to the following `resume`.
//!
//! ```text
//! spawn() ──► resume(None) ──Yield(m1)──► m1 ──x1──► resume(Some(x1)) ──Yield(m2)──► ..
//!                                                             .. ──Return(v)──► resolve v
//! ```
//!
//! The drive loop uses the same [`TimingFlag`] trampoline as
//! [`chain_rec`](super::chain_rec()), so synchronous yields never grow the
//! stack. A yielded computation's rejection ends the session unchanged;
//! its crash is wrapped with the yielded computation's description.
//! Cancelling stops the active computation and no further `resume` happens.
//!
//! Any `FnMut(Option<Y>) -> GoStep<Y, T, E>` closure is a coroutine:
//!
//! ```
//! use trifuture::combinator::{go, GoStep};
//! use trifuture::future::resolve;
//! use trifuture::lab::LabRuntime;
//! use trifuture::types::Outcome;
//!
//! let sum = go(|| {
//!     let mut a = 0;
//!     let mut stage = 0;
//!     move |input: Option<u32>| {
//!         stage += 1;
//!         match (stage, input) {
//!             (1, _) => GoStep::Yield(resolve::<u32, ()>(1)),
//!             (2, Some(x)) => {
//!                 a = x;
//!                 GoStep::Yield(resolve(2))
//!             }
//!             (_, b) => GoStep::Return(a + b.unwrap_or_default()),
//!         }
//!     }
//! });
//! assert_eq!(LabRuntime::default().block_on(&sum), Some(Outcome::Resolve(3)));
//! ```

use crate::cx::Cx;
use crate::future::{Computation, Continuation, Interpret, TimingFlag};
use crate::types::{catch, Cancel, CancelSlot};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// What a coroutine does when resumed.
pub enum GoStep<Y, T, E> {
    /// Interpret this computation and resume with its value.
    Yield(Computation<Y, E>),
    /// Finish the session with this value.
    Return(T),
}

impl<Y, T: fmt::Debug, E> fmt::Debug for GoStep<Y, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yield(m) => f.debug_tuple("Yield").field(m).finish(),
            Self::Return(value) => f.debug_tuple("Return").field(value).finish(),
        }
    }
}

/// A resumable sequence of computations.
pub trait Coroutine<Y, T, E> {
    /// Advances the coroutine.
    ///
    /// `input` is `None` on the first call and the value of the previously
    /// yielded computation afterwards.
    fn resume(&mut self, input: Option<Y>) -> GoStep<Y, T, E>;
}

impl<Y, T, E, F> Coroutine<Y, T, E> for F
where
    F: FnMut(Option<Y>) -> GoStep<Y, T, E>,
{
    fn resume(&mut self, input: Option<Y>) -> GoStep<Y, T, E> {
        self(input)
    }
}

struct Go<F, Y> {
    spawn: F,
    _yield: PhantomData<fn() -> Y>,
}

struct GoSession<G, Y, T, E> {
    coroutine: RefCell<G>,
    cx: Cx,
    k: Continuation<T, E>,
    timing: TimingFlag,
    input: RefCell<Option<Y>>,
    slot: Rc<CancelSlot>,
    finished: Cell<bool>,
}

impl<G, Y, T, E> GoSession<G, Y, T, E>
where
    G: Coroutine<Y, T, E> + 'static,
    Y: 'static,
    T: 'static,
    E: 'static,
{
    fn drain(self: &Rc<Self>) {
        loop {
            if self.slot.is_cancelled() {
                return;
            }
            let input = self.input.borrow_mut().take();
            let step = match catch(|| self.coroutine.borrow_mut().resume(input)) {
                Ok(step) => step,
                Err(crash) => {
                    self.finish();
                    self.k
                        .crash(crash.context("Future.do was passing control to the iterator"));
                    return;
                }
            };
            let m = match step {
                GoStep::Yield(m) => m,
                GoStep::Return(value) => {
                    self.finish();
                    self.k.resolve(value);
                    return;
                }
            };

            self.timing.arm();
            let handle = m.interpret(&self.cx, self.continuation(&m));
            if !self.finished.get() {
                self.slot.set(handle);
            }
            if !self.timing.returned() {
                return;
            }
        }
    }

    fn continuation(self: &Rc<Self>, m: &Computation<Y, E>) -> Continuation<Y, E> {
        let on_crash = Rc::clone(self);
        let on_reject = Rc::clone(self);
        let on_resolve = Rc::clone(self);
        let yielded = m.clone();
        Continuation::new(
            move |crash| {
                on_crash.finish();
                on_crash.k.crash(
                    crash.context_in("Future.do was consuming a generated Future", &yielded),
                );
            },
            move |reason| {
                on_reject.finish();
                on_reject.k.reject(reason);
            },
            move |value| on_resolve.resumed(value),
        )
    }

    fn resumed(self: &Rc<Self>, value: Y) {
        *self.input.borrow_mut() = Some(value);
        if self.timing.settled() {
            self.drain();
        }
    }

    fn finish(&self) {
        self.finished.set(true);
        self.slot.clear();
    }
}

impl<Y, T, E, G, F> Interpret<T, E> for Go<F, Y>
where
    Y: 'static,
    T: 'static,
    E: 'static,
    G: Coroutine<Y, T, E> + 'static,
    F: Fn() -> G,
{
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let coroutine = match catch(|| (self.spawn)()) {
            Ok(coroutine) => coroutine,
            Err(crash) => {
                k.crash(crash.context("Future.do was spawning an iterator"));
                return Cancel::noop();
            }
        };
        let session = Rc::new(GoSession {
            coroutine: RefCell::new(coroutine),
            cx: cx.clone(),
            k,
            timing: TimingFlag::new(),
            input: RefCell::new(None),
            slot: Rc::new(CancelSlot::new()),
            finished: Cell::new(false),
        });
        session.drain();
        CancelSlot::handle(&session.slot)
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Future.do(..)")
    }
}

/// Drives a fresh coroutine from `spawn` in every session.
pub fn go<Y, T, E, G, F>(spawn: F) -> Computation<T, E>
where
    Y: 'static,
    T: 'static,
    E: 'static,
    G: Coroutine<Y, T, E> + 'static,
    F: Fn() -> G + 'static,
{
    Computation::from_interpret(Go {
        spawn,
        _yield: PhantomData,
    })
}
