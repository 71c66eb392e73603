//! Pairing two computations run side by side.
//!
//! Both children are interpreted in the same session, left first. The pair
//! resolves once both values are in. The first rejection or crash cancels
//! the other child and is the only outcome delivered; crashes are forwarded
//! unchanged. If the left child fails synchronously the right one is never
//! started.

use crate::cx::Cx;
use crate::future::{Computation, Continuation, Interpret};
use crate::tracing_compat::debug;
use crate::types::{Cancel, CancelKind, CancelSet};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

const LEFT: usize = 0;
const RIGHT: usize = 1;

struct Both<A: 'static, B: 'static, E: 'static> {
    left: Computation<A, E>,
    right: Computation<B, E>,
}

impl<A: 'static, B: 'static, E: 'static> Drop for Both<A, B, E> {
    fn drop(&mut self) {
        self.left.take().release();
        self.right.take().release();
    }
}

struct BothSession<A, B, E> {
    k: Continuation<(A, B), E>,
    left: RefCell<Option<A>>,
    right: RefCell<Option<B>>,
    live: Rc<CancelSet>,
    settled: Cell<bool>,
}

impl<A: 'static, B: 'static, E: 'static> BothSession<A, B, E> {
    fn continuation<T: 'static>(
        self: &Rc<Self>,
        index: usize,
        store: impl Fn(&Self, T) + 'static,
    ) -> Continuation<T, E> {
        let on_crash = Rc::clone(self);
        let on_reject = Rc::clone(self);
        let on_resolve = Rc::clone(self);
        Continuation::new(
            move |crash| on_crash.fail(index, |k| k.crash(crash)),
            move |reason| on_reject.fail(index, |k| k.reject(reason)),
            move |value| {
                if on_resolve.settled.get() {
                    return;
                }
                on_resolve.live.remove(index);
                store(on_resolve.as_ref(), value);
                on_resolve.try_complete();
            },
        )
    }

    fn try_complete(&self) {
        if self.left.borrow().is_none() || self.right.borrow().is_none() {
            return;
        }
        let pair = self.left.take().zip(self.right.take());
        if let Some(pair) = pair {
            self.settled.set(true);
            self.k.resolve(pair);
        }
    }

    fn fail(&self, index: usize, deliver: impl FnOnce(&Continuation<(A, B), E>)) {
        if self.settled.replace(true) {
            return;
        }
        self.live.remove(index);
        debug!(index, "Future.both failing fast");
        self.live.cancel_all(CancelKind::FailFast);
        deliver(&self.k);
    }

    fn cancel(&self) {
        if self.settled.replace(true) {
            return;
        }
        self.live.cancel_all(CancelKind::ParentCancelled);
    }
}

impl<A: 'static, B: 'static, E: 'static> Interpret<(A, B), E> for Both<A, B, E> {
    fn interpret(&self, cx: &Cx, k: Continuation<(A, B), E>) -> Cancel {
        let session = Rc::new(BothSession {
            k,
            left: RefCell::new(None),
            right: RefCell::new(None),
            live: Rc::new(CancelSet::with_capacity(2)),
            settled: Cell::new(false),
        });

        let left_k = session.continuation(LEFT, |s: &BothSession<A, B, E>, value| {
            *s.left.borrow_mut() = Some(value);
        });
        let handle = self.left.interpret(cx, left_k);
        if session.settled.get() {
            return Cancel::noop();
        }
        if session.left.borrow().is_none() {
            session.live.insert(LEFT, handle);
        }

        let right_k = session.continuation(RIGHT, |s: &BothSession<A, B, E>, value| {
            *s.right.borrow_mut() = Some(value);
        });
        let handle = self.right.interpret(cx, right_k);
        if !session.settled.get() && session.right.borrow().is_none() {
            session.live.insert(RIGHT, handle);
        }
        Cancel::new(move || session.cancel())
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Future.both({}, {})", self.left, self.right)
    }
}

/// Runs `left` and `right` side by side and resolves with both values.
///
/// ```
/// use trifuture::combinator::both;
/// use trifuture::future::after;
/// use trifuture::lab::LabRuntime;
/// use trifuture::types::{Delay, Outcome};
///
/// let pair = both(
///     after::<_, ()>(Delay::from_millis(20), 'a'),
///     after(Delay::from_millis(30), 1),
/// );
/// let lab = LabRuntime::default();
/// assert_eq!(lab.block_on(&pair), Some(Outcome::Resolve(('a', 1))));
/// assert_eq!(lab.now().as_millis(), 30);
/// ```
pub fn both<A, B, E>(left: Computation<A, E>, right: Computation<B, E>) -> Computation<(A, B), E>
where
    A: 'static,
    B: 'static,
    E: 'static,
{
    Computation::from_interpret(Both { left, right })
}

impl<T: 'static, E: 'static> Computation<T, E> {
    /// Method form of [`both`].
    #[must_use]
    pub fn both<B: 'static>(&self, other: &Computation<B, E>) -> Computation<(T, B), E> {
        both(self.clone(), other.clone())
    }
}
