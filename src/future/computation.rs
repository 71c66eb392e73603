//! The computation handle and the interpretation contract.
//!
//! A [`Computation`] is an immutable description of a deferred effect that
//! settles through one of three channels: crash, reject or resolve. Building
//! one never runs anything. Each call to [`Computation::interpret`] starts an
//! independent session, and every variant (leaf or combinator) implements
//! the same [`Interpret`] contract:
//!
//! - at most one continuation fires, at most once, per session
//! - the returned [`Cancel`] suppresses all later delivery when called
//!   before settlement, and is a no-op afterwards
//!
//! Combinators only ever talk to their children through this contract.

use super::leaf::never;
use crate::cx::Cx;
use crate::types::{catch, Cancel, CancelSlot, Crash, Outcome};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

/// What a combinator may assume about a computation without interpreting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceHint {
    /// Nothing is known ahead of interpretation.
    Dynamic,
    /// Settles synchronously with a value known at construction.
    Settled,
    /// Never settles.
    Never,
    /// Settles with a known value once the duration elapses on the host timer.
    Timed(Duration),
}

/// The protocol every computation variant implements.
pub trait Interpret<T, E> {
    /// Starts a new session, delivering at most one outcome to `k`.
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel;

    /// Starts a new session whose live handle is kept in `slot`.
    ///
    /// Sequential combinators hand their own slot to the child they finish
    /// with. Variants that are themselves sequential override this to run in
    /// that slot directly, so a recursive chain holds one slot however many
    /// steps it takes.
    fn interpret_in(&self, cx: &Cx, k: Continuation<T, E>, slot: &Rc<CancelSlot>) {
        slot.set(self.interpret(cx, k));
    }

    /// Writes a diagnostic rendering of this computation.
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    /// Reports what is statically known about how this computation settles.
    fn race_hint(&self) -> RaceHint {
        RaceHint::Dynamic
    }

    /// Returns the same computation with its channels relabelled, if that
    /// can be done without interpreting it.
    fn swap(&self) -> Option<Computation<E, T>> {
        None
    }
}

/// The three continuations of one session.
pub struct Continuation<T, E> {
    crash: Rc<dyn Fn(Crash)>,
    reject: Rc<dyn Fn(E)>,
    resolve: Rc<dyn Fn(T)>,
}

impl<T, E> Clone for Continuation<T, E> {
    fn clone(&self) -> Self {
        Self {
            crash: Rc::clone(&self.crash),
            reject: Rc::clone(&self.reject),
            resolve: Rc::clone(&self.resolve),
        }
    }
}

impl<T: 'static, E: 'static> Continuation<T, E> {
    /// Bundles three continuations.
    pub fn new(
        crash: impl Fn(Crash) + 'static,
        reject: impl Fn(E) + 'static,
        resolve: impl Fn(T) + 'static,
    ) -> Self {
        Self {
            crash: Rc::new(crash),
            reject: Rc::new(reject),
            resolve: Rc::new(resolve),
        }
    }

    /// Routes all three channels into one outcome callback.
    pub fn from_settle(settle: impl Fn(Outcome<T, E>) + 'static) -> Self {
        let settle = Rc::new(settle);
        let on_crash = Rc::clone(&settle);
        let on_reject = Rc::clone(&settle);
        Self::new(
            move |crash| on_crash(Outcome::Crash(crash)),
            move |e| on_reject(Outcome::Reject(e)),
            move |v| settle(Outcome::Resolve(v)),
        )
    }

    /// Delivers a crash.
    pub fn crash(&self, crash: Crash) {
        (self.crash)(crash);
    }

    /// Delivers a rejection.
    pub fn reject(&self, reason: E) {
        (self.reject)(reason);
    }

    /// Delivers a value.
    pub fn resolve(&self, value: T) {
        (self.resolve)(value);
    }

    /// Delivers an outcome through its channel.
    pub fn settle(&self, outcome: Outcome<T, E>) {
        match outcome {
            Outcome::Crash(crash) => self.crash(crash),
            Outcome::Reject(reason) => self.reject(reason),
            Outcome::Resolve(value) => self.resolve(value),
        }
    }

    /// Keeps the crash and reject channels, replacing the resolve channel.
    pub fn on_resolve<U>(&self, resolve: impl Fn(U) + 'static) -> Continuation<U, E> {
        Continuation {
            crash: Rc::clone(&self.crash),
            reject: Rc::clone(&self.reject),
            resolve: Rc::new(resolve),
        }
    }

    /// Keeps the crash and resolve channels, replacing the reject channel.
    pub fn on_reject<F>(&self, reject: impl Fn(F) + 'static) -> Continuation<T, F> {
        Continuation {
            crash: Rc::clone(&self.crash),
            reject: Rc::new(reject),
            resolve: Rc::clone(&self.resolve),
        }
    }

    /// Keeps the reject and resolve channels, replacing the crash channel.
    #[must_use]
    pub fn on_crash(&self, crash: impl Fn(Crash) + 'static) -> Self {
        Self {
            crash: Rc::new(crash),
            reject: Rc::clone(&self.reject),
            resolve: Rc::clone(&self.resolve),
        }
    }
}

impl<T, E> fmt::Debug for Continuation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation").finish_non_exhaustive()
    }
}

/// A lazy, cancellable computation.
///
/// Cloning is cheap and shares the description, never a session.
pub struct Computation<T, E> {
    inner: Rc<dyn Interpret<T, E>>,
}

impl<T, E> Clone for Computation<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static, E: 'static> Computation<T, E> {
    /// Wraps a variant implementing the interpretation contract.
    pub fn from_interpret(variant: impl Interpret<T, E> + 'static) -> Self {
        Self {
            inner: Rc::new(variant),
        }
    }

    /// Creates a computation from a function that starts the effect.
    ///
    /// The function receives a [`Resolver`] and returns the handle that
    /// stops the effect. The resolver ignores every call after the first and
    /// every call after cancellation. A panic while starting is a crash.
    ///
    /// ```
    /// use trifuture::future::Computation;
    /// use trifuture::lab::LabRuntime;
    /// use trifuture::types::{Cancel, Outcome};
    ///
    /// let answer = Computation::<u32, String>::new(|_cx, resolver| {
    ///     resolver.resolve(42);
    ///     Cancel::noop()
    /// });
    /// let lab = LabRuntime::default();
    /// assert_eq!(lab.block_on(&answer), Some(Outcome::Resolve(42)));
    /// ```
    pub fn new<F>(start: F) -> Self
    where
        F: Fn(&Cx, Resolver<T, E>) -> Cancel + 'static,
    {
        Self::from_interpret(FromFn { start })
    }

    /// Starts a new session.
    pub fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        self.inner.interpret(cx, k)
    }

    pub(crate) fn interpret_in(&self, cx: &Cx, k: Continuation<T, E>, slot: &Rc<CancelSlot>) {
        self.inner.interpret_in(cx, k, slot);
    }

    /// Reports what is statically known about how this computation settles.
    #[must_use]
    pub fn race_hint(&self) -> RaceHint {
        self.inner.race_hint()
    }

    pub(crate) fn static_swap(&self) -> Option<Computation<E, T>> {
        self.inner.swap()
    }

    /// Moves this handle out, leaving `never()` in its place.
    pub(crate) fn take(&mut self) -> Self {
        mem::replace(self, never())
    }

    /// Drops this handle without recursing into the tree it keeps alive.
    ///
    /// Combinators call this from `Drop` for the computations they hold. The
    /// outermost call drops queued handles one at a time; nested calls only
    /// enqueue, so a tower of any depth tears down in constant stack.
    pub(crate) fn release(self) {
        if Rc::strong_count(&self.inner) > 1 {
            return;
        }
        let mut held = Some(self);
        // Without the thread-local, `held` drops recursively below.
        let _ = TEARDOWN.try_with(|teardown| {
            if let Some(computation) = held.take() {
                teardown.pending.borrow_mut().push(Box::new(computation));
            }
            teardown.drain();
        });
    }

    /// Interprets with one callback per channel.
    pub fn fork_catch(
        &self,
        cx: &Cx,
        on_crash: impl Fn(Crash) + 'static,
        on_reject: impl Fn(E) + 'static,
        on_resolve: impl Fn(T) + 'static,
    ) -> Cancel {
        self.interpret(cx, Continuation::new(on_crash, on_reject, on_resolve))
    }

    /// Interprets with reject and resolve callbacks.
    ///
    /// # Panics
    ///
    /// A crash is raised as a panic carrying the rendered trail, on whichever
    /// thread delivers it. Use [`fork_catch`](Self::fork_catch) to observe
    /// crashes as values.
    pub fn fork(
        &self,
        cx: &Cx,
        on_reject: impl Fn(E) + 'static,
        on_resolve: impl Fn(T) + 'static,
    ) -> Cancel {
        self.fork_catch(cx, |crash| panic!("{crash}"), on_reject, on_resolve)
    }

    /// Interprets and hands the outcome to `f`.
    pub fn settle(&self, cx: &Cx, f: impl FnOnce(Outcome<T, E>) + 'static) -> Cancel {
        let f = Cell::new(Some(f));
        self.interpret(
            cx,
            Continuation::from_settle(move |outcome| {
                if let Some(f) = f.take() {
                    f(outcome);
                }
            }),
        )
    }

    /// Interprets and hands the rejection or value to `f` as a `Result`.
    ///
    /// # Panics
    ///
    /// A crash is raised as a panic, as with [`fork`](Self::fork).
    pub fn done(&self, cx: &Cx, f: impl FnOnce(Result<T, E>) + 'static) -> Cancel {
        self.settle(cx, move |outcome| match outcome {
            Outcome::Resolve(value) => f(Ok(value)),
            Outcome::Reject(reason) => f(Err(reason)),
            Outcome::Crash(crash) => panic!("{crash}"),
        })
    }
}

impl<T, E> fmt::Display for Computation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.describe(f)
    }
}

impl<T, E> fmt::Debug for Computation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Computation({self})")
    }
}

/// Settles the session of a [`Computation::new`] computation.
///
/// Clones share one session; only the first delivery counts.
pub struct Resolver<T, E> {
    k: Continuation<T, E>,
    open: Rc<Cell<bool>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            k: self.k.clone(),
            open: Rc::clone(&self.open),
        }
    }
}

impl<T: 'static, E: 'static> Resolver<T, E> {
    /// Resolves the session with `value`.
    pub fn resolve(&self, value: T) {
        if self.open.replace(false) {
            self.k.resolve(value);
        }
    }

    /// Rejects the session with `reason`.
    pub fn reject(&self, reason: E) {
        if self.open.replace(false) {
            self.k.reject(reason);
        }
    }

    /// Settles the session from a `Result`.
    pub fn complete(&self, result: Result<T, E>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(reason) => self.reject(reason),
        }
    }

    /// Returns false once the session settled or was cancelled.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.get()
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("open", &self.open.get())
            .finish_non_exhaustive()
    }
}

struct Teardown {
    pending: RefCell<Vec<Box<dyn Any>>>,
    draining: Cell<bool>,
}

impl Teardown {
    fn drain(&self) {
        if self.draining.replace(true) {
            return;
        }
        let _reset = DrainGuard(&self.draining);
        loop {
            let next = self.pending.borrow_mut().pop();
            match next {
                Some(computation) => drop(computation),
                None => break,
            }
        }
    }
}

struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

thread_local! {
    static TEARDOWN: Teardown = const {
        Teardown {
            pending: RefCell::new(Vec::new()),
            draining: Cell::new(false),
        }
    };
}

struct FromFn<F> {
    start: F,
}

impl<T, E, F> Interpret<T, E> for FromFn<F>
where
    T: 'static,
    E: 'static,
    F: Fn(&Cx, Resolver<T, E>) -> Cancel,
{
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let open = Rc::new(Cell::new(true));
        let resolver = Resolver {
            k: k.clone(),
            open: Rc::clone(&open),
        };
        match catch(|| (self.start)(cx, resolver)) {
            Ok(stop) => Cancel::new(move || {
                if open.replace(false) {
                    stop.cancel();
                }
            }),
            Err(crash) => {
                if open.replace(false) {
                    k.crash(crash.context("Future was executing its computation"));
                }
                Cancel::noop()
            }
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Future(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{outcome_sink, test_lab};
    use std::time::Duration;

    #[test]
    fn new_is_lazy() {
        let started = Rc::new(Cell::new(0));
        let count = Rc::clone(&started);
        let m = Computation::<u8, ()>::new(move |_, resolver| {
            count.set(count.get() + 1);
            resolver.resolve(1);
            Cancel::noop()
        });
        assert_eq!(started.get(), 0);

        let lab = test_lab();
        assert_eq!(lab.block_on(&m), Some(Outcome::Resolve(1)));
        assert_eq!(lab.block_on(&m), Some(Outcome::Resolve(1)));
        assert_eq!(started.get(), 2);
    }

    #[test]
    fn resolver_delivers_once() {
        let m = Computation::<u8, &str>::new(|_, resolver| {
            resolver.reject("first");
            resolver.resolve(2);
            resolver.reject("third");
            Cancel::noop()
        });
        let lab = test_lab();
        let (seen, k) = outcome_sink();
        m.interpret(&lab.cx(), k);
        assert_eq!(*seen.borrow(), [Outcome::Reject("first")]);
    }

    #[test]
    fn cancel_closes_the_resolver() {
        let lab = test_lab();
        let stopped = Rc::new(Cell::new(false));
        let flag = Rc::clone(&stopped);
        let m = Computation::<u8, ()>::new(move |cx, resolver| {
            let flag = Rc::clone(&flag);
            let id = cx.schedule(Duration::from_millis(5), move || resolver.resolve(9));
            let cx = cx.clone();
            Cancel::new(move || {
                flag.set(true);
                cx.clear(id);
            })
        });

        let (seen, k) = outcome_sink();
        let cancel = m.interpret(&lab.cx(), k);
        cancel.cancel();
        cancel.cancel();
        lab.run_until_idle();
        assert!(stopped.get());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn panics_while_starting_are_crashes() {
        let m = Computation::<u8, ()>::new(|_, _| panic!("cannot start"));
        let lab = test_lab();
        let crash = lab.block_on(&m).and_then(Outcome::crashed).expect("crash");
        assert_eq!(crash.message(), "cannot start");
        assert_eq!(
            crash.phases().collect::<Vec<_>>(),
            ["Future was executing its computation"]
        );
    }

    #[test]
    fn settle_and_done_receive_outcomes() {
        let lab = test_lab();
        let m = Computation::<u8, &str>::new(|_, resolver| {
            resolver.reject("nope");
            Cancel::noop()
        });
        let got = Rc::new(Cell::new(None));
        let sink = Rc::clone(&got);
        m.done(&lab.cx(), move |result| sink.set(Some(result)));
        assert_eq!(got.get(), Some(Err("nope")));
    }

    #[test]
    fn display_renders_description() {
        let m = Computation::<u8, ()>::new(|_, _| Cancel::noop());
        assert_eq!(m.to_string(), "Future(..)");
        assert_eq!(format!("{m:?}"), "Computation(Future(..))");
    }
}
