//! Sequencing: feed one computation's outcome into the next.
//!
//! ```text
//! chain(m, f):      m ──resolve x──► f(x) ──► child ──► caller
//!                   m ──reject/crash────────────────────► caller
//!
//! chain_rej(m, f):  m ──reject e──► f(e) ──► child ──► caller
//!                   m ──resolve/crash───────────────────► caller
//! ```
//!
//! The session holds one [`CancelSlot`]: it points at `m` until `m`
//! settles and at the child afterwards. The child runs in that same slot,
//! so when `f` returns another chain the whole recursion shares one slot
//! and cancelling it is a single step at any depth.
//!
//! Both the parent and the child are started through the context's
//! trampoline, so long chains of synchronously settling steps (left-nested
//! `m.chain(f).chain(g)..` or recursive `f` returning further chains) run in
//! bounded stack.
//!
//! # Algebraic Laws
//!
//! - Left identity: `chain(resolve(x), f) ≃ f(x)`
//! - Right identity: `chain(m, resolve) ≃ m`
//! - Associativity: `chain(chain(m, f), g) ≃ chain(m, |x| chain(f(x), g))`

use crate::cx::Cx;
use crate::future::{Computation, Continuation, Interpret};
use crate::types::{catch, Cancel, CancelSlot, Crash};
use std::fmt;
use std::rc::Rc;

/// Interprets `parent` on the trampoline and offers its handle to `slot`.
///
/// The offer is tied to the slot's current epoch: if `parent` settles
/// synchronously and the slot has moved on, its handle is dropped.
pub(crate) fn start_parent<T: 'static, E: 'static>(
    cx: &Cx,
    slot: &Rc<CancelSlot>,
    parent: &Computation<T, E>,
    k: Continuation<T, E>,
) {
    let epoch = slot.epoch();
    let slot = Rc::clone(slot);
    let parent = parent.clone();
    let parent_cx = cx.clone();
    cx.bounce(move || {
        if slot.is_cancelled() {
            return;
        }
        let handle = parent.interpret(&parent_cx, k);
        slot.offer_at(epoch, handle);
    });
}

/// Builds the next child on the trampoline and runs it in `slot`.
/// A panic while building is reported through `on_panic`.
pub(crate) fn start_next<U: 'static, E: 'static>(
    cx: &Cx,
    slot: &Rc<CancelSlot>,
    k: Continuation<U, E>,
    build: impl FnOnce() -> Computation<U, E> + 'static,
    on_panic: impl FnOnce(Crash) -> Crash + 'static,
) {
    let slot = Rc::clone(slot);
    let child_cx = cx.clone();
    cx.bounce(move || {
        if slot.is_cancelled() {
            return;
        }
        slot.clear();
        match catch(build) {
            Ok(child) => child.interpret_in(&child_cx, k, &slot),
            Err(crash) => k.crash(on_panic(crash)),
        }
    });
}

struct Chain<T: 'static, E: 'static, F> {
    parent: Computation<T, E>,
    f: Rc<F>,
}

impl<T: 'static, E: 'static, F> Drop for Chain<T, E, F> {
    fn drop(&mut self) {
        self.parent.take().release();
    }
}

impl<T, U, E, F> Interpret<U, E> for Chain<T, E, F>
where
    T: 'static,
    U: 'static,
    E: 'static,
    F: Fn(T) -> Computation<U, E> + 'static,
{
    fn interpret(&self, cx: &Cx, k: Continuation<U, E>) -> Cancel {
        let slot = Rc::new(CancelSlot::new());
        self.interpret_in(cx, k, &slot);
        CancelSlot::handle(&slot)
    }

    fn interpret_in(&self, cx: &Cx, k: Continuation<U, E>, slot: &Rc<CancelSlot>) {
        let on_resolve = {
            let f = Rc::clone(&self.f);
            let parent = self.parent.clone();
            let slot = Rc::clone(slot);
            let cx = cx.clone();
            let k = k.clone();
            move |value: T| {
                let f = Rc::clone(&f);
                let parent = parent.clone();
                start_next(
                    &cx,
                    &slot,
                    k.clone(),
                    move || f(value),
                    move |crash| {
                        crash.context_in(
                            "Future.chain was calling its function",
                            format!("{parent}.chain(..)"),
                        )
                    },
                );
            }
        };
        start_parent(cx, slot, &self.parent, k.on_resolve(on_resolve));
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.chain(..)", self.parent)
    }
}

struct ChainRej<T: 'static, E: 'static, F> {
    parent: Computation<T, E>,
    f: Rc<F>,
}

impl<T: 'static, E: 'static, F> Drop for ChainRej<T, E, F> {
    fn drop(&mut self) {
        self.parent.take().release();
    }
}

impl<T, E, G, F> Interpret<T, G> for ChainRej<T, E, F>
where
    T: 'static,
    E: 'static,
    G: 'static,
    F: Fn(E) -> Computation<T, G> + 'static,
{
    fn interpret(&self, cx: &Cx, k: Continuation<T, G>) -> Cancel {
        let slot = Rc::new(CancelSlot::new());
        self.interpret_in(cx, k, &slot);
        CancelSlot::handle(&slot)
    }

    fn interpret_in(&self, cx: &Cx, k: Continuation<T, G>, slot: &Rc<CancelSlot>) {
        let on_reject = {
            let f = Rc::clone(&self.f);
            let parent = self.parent.clone();
            let slot = Rc::clone(slot);
            let cx = cx.clone();
            let k = k.clone();
            move |reason: E| {
                let f = Rc::clone(&f);
                let parent = parent.clone();
                start_next(
                    &cx,
                    &slot,
                    k.clone(),
                    move || f(reason),
                    move |crash| {
                        crash.context_in(
                            "Future.chainRej was calling its function",
                            format!("{parent}.chainRej(..)"),
                        )
                    },
                );
            }
        };
        start_parent(cx, slot, &self.parent, k.on_reject(on_reject));
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.chainRej(..)", self.parent)
    }
}

/// Sequences `f` after `m` resolves.
///
/// A rejection or crash of `m` passes through without calling `f`. A panic
/// in `f` is a crash.
///
/// ```
/// use trifuture::combinator::chain;
/// use trifuture::future::resolve;
/// use trifuture::lab::LabRuntime;
/// use trifuture::types::Outcome;
///
/// let m = chain(resolve::<u32, ()>(20), |x| resolve(x + 22));
/// assert_eq!(LabRuntime::default().block_on(&m), Some(Outcome::Resolve(42)));
/// ```
pub fn chain<T, U, E, F>(m: Computation<T, E>, f: F) -> Computation<U, E>
where
    T: 'static,
    U: 'static,
    E: 'static,
    F: Fn(T) -> Computation<U, E> + 'static,
{
    Computation::from_interpret(Chain {
        parent: m,
        f: Rc::new(f),
    })
}

/// Sequences `f` after `m` rejects, recovering from (or replacing) the
/// rejection.
pub fn chain_rej<T, E, G, F>(m: Computation<T, E>, f: F) -> Computation<T, G>
where
    T: 'static,
    E: 'static,
    G: 'static,
    F: Fn(E) -> Computation<T, G> + 'static,
{
    Computation::from_interpret(ChainRej {
        parent: m,
        f: Rc::new(f),
    })
}

/// Runs `a`, then `b`, keeping the value of `b`.
pub fn and<T, U, E>(a: Computation<T, E>, b: Computation<U, E>) -> Computation<U, E>
where
    T: 'static,
    U: 'static,
    E: 'static,
{
    chain(a, move |_| b.clone())
}

/// Runs `a`, and `b` only if `a` rejects.
pub fn alt<T, E>(a: Computation<T, E>, b: Computation<T, E>) -> Computation<T, E>
where
    T: 'static,
    E: 'static,
{
    chain_rej(a, move |_| b.clone())
}

impl<T: 'static, E: 'static> Computation<T, E> {
    /// Method form of [`chain`].
    pub fn chain<U: 'static>(
        &self,
        f: impl Fn(T) -> Computation<U, E> + 'static,
    ) -> Computation<U, E> {
        chain(self.clone(), f)
    }

    /// Method form of [`chain_rej`].
    pub fn chain_rej<G: 'static>(
        &self,
        f: impl Fn(E) -> Computation<T, G> + 'static,
    ) -> Computation<T, G> {
        chain_rej(self.clone(), f)
    }

    /// Method form of [`and`].
    #[must_use]
    pub fn and<U: 'static>(&self, other: &Computation<U, E>) -> Computation<U, E> {
        and(self.clone(), other.clone())
    }

    /// Method form of [`alt`].
    #[must_use]
    pub fn alt(&self, other: &Self) -> Self {
        alt(self.clone(), other.clone())
    }
}
