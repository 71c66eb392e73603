//! Bounded-concurrency parallel interpretation.
//!
//! `parallel(limit, children)` keeps at most `limit` children interpreting
//! at any time and starts the next child, in input order, whenever one
//! resolves. Values are written into index-addressed slots, so the result
//! is in input order whatever the completion order.
//!
//! ```text
//! limit = 2:   [c0 c1] c2 c3 c4
//!              c1 resolves ──► start c2
//!              c0 resolves ──► start c3
//!              c2 rejects  ──► cancel c3, deliver the rejection
//! ```
//!
//! The first rejection or crash cancels every live child, starts no more,
//! and is the only outcome delivered. Cancelling the session cancels only
//! the live children; children not yet started never start.
//!
//! Synchronously settling children are started by an explicit loop guarded
//! by a `draining` flag, so long lists of them run in bounded stack.

use crate::cx::Cx;
use crate::error::describe_position;
use crate::future::{Computation, Continuation, Interpret};
use crate::tracing_compat::{debug, trace};
use crate::types::{Cancel, CancelKind, CancelSet, Concurrency, Crash};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

struct Parallel<T, E> {
    limit: Concurrency,
    children: Rc<[Computation<T, E>]>,
}

struct ParallelSession<T, E> {
    cx: Cx,
    k: Continuation<Vec<T>, E>,
    children: Rc<[Computation<T, E>]>,
    limit: usize,
    next: Cell<usize>,
    running: Cell<usize>,
    remaining: Cell<usize>,
    values: RefCell<Vec<Option<T>>>,
    live: Rc<CancelSet>,
    settled: Cell<bool>,
    draining: Cell<bool>,
}

impl<T: 'static, E: 'static> ParallelSession<T, E> {
    /// Starts children until the limit is reached or none are left.
    fn pump(self: &Rc<Self>) {
        if self.draining.replace(true) {
            return;
        }
        while !self.settled.get()
            && self.running.get() < self.limit
            && self.next.get() < self.children.len()
        {
            let index = self.next.get();
            self.next.set(index + 1);
            self.running.set(self.running.get() + 1);
            trace!(index, running = self.running.get(), "Future.parallel starting child");

            let child = self.children[index].clone();
            let handle = child.interpret(&self.cx, self.continuation(index));
            if !self.settled.get() && self.values.borrow()[index].is_none() {
                self.live.insert(index, handle);
            }
        }
        self.draining.set(false);
    }

    fn continuation(self: &Rc<Self>, index: usize) -> Continuation<T, E> {
        let on_crash = Rc::clone(self);
        let on_reject = Rc::clone(self);
        let on_resolve = Rc::clone(self);
        Continuation::new(
            move |crash| on_crash.crashed(index, crash),
            move |reason| on_reject.fail(index, |k| k.reject(reason)),
            move |value| on_resolve.resolved(index, value),
        )
    }

    fn resolved(self: &Rc<Self>, index: usize, value: T) {
        if self.settled.get() {
            return;
        }
        self.live.remove(index);
        self.values.borrow_mut()[index] = Some(value);
        self.running.set(self.running.get() - 1);
        self.remaining.set(self.remaining.get() - 1);
        if self.remaining.get() == 0 {
            self.settled.set(true);
            let values: Vec<T> = self.values.take().into_iter().flatten().collect();
            self.k.resolve(values);
        } else {
            self.pump();
        }
    }

    fn crashed(&self, index: usize, crash: Crash) {
        let child = self.children[index].clone();
        self.fail(index, move |k| {
            k.crash(crash.context_in(
                format!(
                    "Future.parallel was running {}",
                    describe_position(index, "future")
                ),
                child,
            ));
        });
    }

    fn fail(&self, index: usize, deliver: impl FnOnce(&Continuation<Vec<T>, E>)) {
        if self.settled.replace(true) {
            return;
        }
        self.live.remove(index);
        debug!(index, live = self.live.live_count(), "Future.parallel failing fast");
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

impl<T: 'static, E: 'static> Interpret<Vec<T>, E> for Parallel<T, E> {
    fn interpret(&self, cx: &Cx, k: Continuation<Vec<T>, E>) -> Cancel {
        let len = self.children.len();
        if len == 0 {
            k.resolve(Vec::new());
            return Cancel::noop();
        }
        let session = Rc::new(ParallelSession {
            cx: cx.clone(),
            k,
            children: Rc::clone(&self.children),
            limit: self.limit.resolve(len),
            next: Cell::new(0),
            running: Cell::new(0),
            remaining: Cell::new(len),
            values: RefCell::new((0..len).map(|_| None).collect()),
            live: Rc::new(CancelSet::with_capacity(len)),
            settled: Cell::new(false),
            draining: Cell::new(false),
        });
        session.pump();
        Cancel::new(move || session.cancel())
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Future.parallel({}, [", self.limit)?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str("])")
    }
}

/// Interprets `children` with at most `limit` running at once, resolving
/// with their values in input order.
///
/// ```
/// use trifuture::combinator::parallel;
/// use trifuture::future::after;
/// use trifuture::lab::LabRuntime;
/// use trifuture::types::{Concurrency, Delay, Outcome};
///
/// let children = ["a", "b", "c", "d", "e"]
///     .map(|x| after::<_, ()>(Delay::from_millis(20), x))
///     .to_vec();
/// let all = parallel(Concurrency::limited(2)?, children);
///
/// let lab = LabRuntime::default();
/// assert_eq!(lab.block_on(&all), Some(Outcome::Resolve(vec!["a", "b", "c", "d", "e"])));
/// assert_eq!(lab.now().as_millis(), 60);
/// # Ok::<(), trifuture::error::InvalidArgument>(())
/// ```
pub fn parallel<T, E>(limit: Concurrency, children: Vec<Computation<T, E>>) -> Computation<Vec<T>, E>
where
    T: 'static,
    E: 'static,
{
    Computation::from_interpret(Parallel {
        limit,
        children: children.into(),
    })
}
