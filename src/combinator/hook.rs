//! Resource safety: acquire, consume, dispose.
//!
//! ```text
//! hook(acquire, dispose, consume):
//!   r ← acquire                      reject/crash: delivered, nothing to dispose
//!   o ← consume(r)                   crash: delivered immediately
//!   dispose(r)                       runs exactly once once r exists
//!   deliver o                        only after disposal resolved
//! ```
//!
//! The session moves through four phases:
//!
//! | Phase | Cancel |
//! |-------|--------|
//! | `Acquiring` | cancels the acquisition |
//! | `Consuming(r)` | cancels the consumption, then starts the disposal with delivery suppressed |
//! | `Disposing` | suppresses delivery; the disposal runs to completion |
//! | `Closed` | nothing |
//!
//! A disposal that rejects replaces the consumption's outcome with its
//! rejection. A disposal that crashes is a crash naming the disposal phase.

use crate::cx::Cx;
use crate::future::{Computation, Continuation, Interpret};
use crate::tracing_compat::{trace, warn};
use crate::types::{catch, Cancel, Crash};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

const CONSUME: &str = "trying to consume resources for a hooked Future";
const DISPOSE: &str = "trying to dispose resources for a hooked Future";

enum Phase<R> {
    Acquiring,
    Consuming(R),
    Disposing,
    Closed,
}

/// Starts the disposal of a resource, or reports the panic of the disposal
/// function.
type Disposer<R, E> = Rc<dyn Fn(&Cx, R, Continuation<(), E>) -> Result<Cancel, Crash>>;

struct Hook<R, E, D, C> {
    acquire: Computation<R, E>,
    dispose: Rc<D>,
    consume: Rc<C>,
}

impl<R, E, D, C> fmt::Display for Hook<R, E, D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Future.hook({}, .., ..)", self.acquire)
    }
}

struct HookSession<R, T, E> {
    cx: Cx,
    k: Continuation<T, E>,
    label: String,
    disposer: Disposer<R, E>,
    phase: RefCell<Phase<R>>,
    live: RefCell<Option<Cancel>>,
}

impl<R, T, E> HookSession<R, T, E>
where
    R: Clone + 'static,
    T: 'static,
    E: 'static,
{
    fn consume(self: &Rc<Self>, resource: R, consume: &dyn Fn(R) -> Computation<T, E>) {
        *self.phase.borrow_mut() = Phase::Consuming(resource.clone());
        let consumption = match catch(|| consume(resource)) {
            Ok(consumption) => consumption,
            Err(crash) => {
                if self.close() {
                    self.k.crash(crash.context_in(CONSUME, &self.label));
                }
                return;
            }
        };

        let on_crash = Rc::clone(self);
        let on_reject = Rc::clone(self);
        let on_resolve = Rc::clone(self);
        let handle = consumption.interpret(
            &self.cx,
            Continuation::new(
                move |crash: Crash| {
                    if on_crash.close() {
                        on_crash
                            .k
                            .crash(crash.context_in(CONSUME, &on_crash.label));
                    }
                },
                move |reason| on_reject.consumed(Err(reason)),
                move |value| on_resolve.consumed(Ok(value)),
            ),
        );
        if matches!(*self.phase.borrow(), Phase::Consuming(_)) {
            *self.live.borrow_mut() = Some(handle);
        }
    }

    fn consumed(self: &Rc<Self>, result: Result<T, E>) {
        let resource = match self.phase.replace(Phase::Disposing) {
            Phase::Consuming(resource) => resource,
            other => {
                self.phase.replace(other);
                return;
            }
        };
        self.live.borrow_mut().take();
        self.dispose(resource, Some(result));
    }

    /// Runs the disposal; `pending` is delivered once it resolves.
    fn dispose(self: &Rc<Self>, resource: R, pending: Option<Result<T, E>>) {
        trace!(label = %self.label, "disposing hooked resource");
        let pending = RefCell::new(pending);
        let on_crash = Rc::clone(self);
        let on_reject = Rc::clone(self);
        let on_resolve = Rc::clone(self);
        let k = Continuation::new(
            move |crash: Crash| {
                let crash = crash.context_in(DISPOSE, &on_crash.label);
                if let Some(k) = on_crash.finish() {
                    k.crash(crash);
                } else {
                    warn!(crash = %crash, "disposal crashed after cancellation");
                }
            },
            move |reason| {
                if let Some(k) = on_reject.finish() {
                    k.reject(reason);
                }
            },
            move |()| {
                let result = pending.borrow_mut().take();
                if let (Some(k), Some(result)) = (on_resolve.finish(), result) {
                    match result {
                        Ok(value) => k.resolve(value),
                        Err(reason) => k.reject(reason),
                    }
                }
            },
        );
        if let Err(crash) = (self.disposer)(&self.cx, resource, k) {
            let crash = crash.context_in(DISPOSE, &self.label);
            if let Some(k) = self.finish() {
                k.crash(crash);
            } else {
                warn!(crash = %crash, "disposal function panicked after cancellation");
            }
        }
    }

    /// Closes a disposing session, returning the continuation if delivery
    /// is still wanted.
    fn finish(&self) -> Option<Continuation<T, E>> {
        let previous = self.phase.replace(Phase::Closed);
        matches!(previous, Phase::Disposing).then(|| self.k.clone())
    }

    /// Closes a consuming session. Returns false if it was not consuming.
    fn close(&self) -> bool {
        let previous = self.phase.replace(Phase::Closed);
        self.live.borrow_mut().take();
        matches!(previous, Phase::Consuming(_))
    }

    fn cancel(self: &Rc<Self>) {
        let previous = self.phase.replace(Phase::Closed);
        trace!("hook cancelled");
        let live = self.live.borrow_mut().take();
        match previous {
            Phase::Acquiring => {
                if let Some(handle) = live {
                    handle.cancel();
                }
            }
            Phase::Consuming(resource) => {
                if let Some(handle) = live {
                    handle.cancel();
                }
                self.dispose(resource, None);
            }
            Phase::Disposing | Phase::Closed => {}
        }
    }
}

impl<R, T, U, E, D, C> Interpret<T, E> for Hook<R, E, D, C>
where
    R: Clone + 'static,
    T: 'static,
    U: 'static,
    E: 'static,
    D: Fn(R) -> Computation<U, E> + 'static,
    C: Fn(R) -> Computation<T, E> + 'static,
{
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let dispose = Rc::clone(&self.dispose);
        let disposer: Disposer<R, E> =
            Rc::new(move |cx: &Cx, resource: R, k: Continuation<(), E>| {
                let disposal = catch(|| dispose(resource))?;
                let done = k.clone();
                Ok(disposal.interpret(cx, k.on_resolve(move |_: U| done.resolve(()))))
            });
        let session = Rc::new(HookSession {
            cx: cx.clone(),
            k: k.clone(),
            label: self.to_string(),
            disposer,
            phase: RefCell::new(Phase::Acquiring),
            live: RefCell::new(None),
        });

        let consume = Rc::clone(&self.consume);
        let acquired = Rc::clone(&session);
        let handle = self.acquire.interpret(
            cx,
            k.on_resolve(move |resource: R| acquired.consume(resource, &*consume)),
        );
        if matches!(*session.phase.borrow(), Phase::Acquiring) {
            *session.live.borrow_mut() = Some(handle);
        }
        Cancel::new(move || session.cancel())
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Acquires a resource, consumes it, and disposes of it exactly once.
///
/// A rejection or crash of `acquire` is delivered as is and nothing is
/// disposed. Otherwise `dispose(r)` runs after the consumption resolves,
/// rejects, or is cancelled, and the consumption's outcome is delivered
/// only after the disposal resolved.
///
/// ```
/// use trifuture::combinator::hook;
/// use trifuture::future::resolve;
/// use trifuture::lab::LabRuntime;
/// use trifuture::types::Outcome;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let (opened, closed) = (Rc::clone(&log), Rc::clone(&log));
/// let m = hook(
///     resolve::<&str, ()>("handle"),
///     move |r| {
///         closed.borrow_mut().push(format!("close {r}"));
///         resolve(())
///     },
///     move |r| {
///         opened.borrow_mut().push(format!("use {r}"));
///         resolve(r.len())
///     },
/// );
/// assert_eq!(LabRuntime::default().block_on(&m), Some(Outcome::Resolve(6)));
/// assert_eq!(*log.borrow(), ["use handle", "close handle"]);
/// ```
pub fn hook<R, T, U, E, D, C>(acquire: Computation<R, E>, dispose: D, consume: C) -> Computation<T, E>
where
    R: Clone + 'static,
    T: 'static,
    U: 'static,
    E: 'static,
    D: Fn(R) -> Computation<U, E> + 'static,
    C: Fn(R) -> Computation<T, E> + 'static,
{
    Computation::from_interpret(Hook {
        acquire,
        dispose: Rc::new(dispose),
        consume: Rc::new(consume),
    })
}
