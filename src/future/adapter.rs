//! Adapter for effects that report back through a completion callback.
//!
//! [`node`] wraps a function that starts an external operation and later
//! calls [`NodeDone::complete`] with the operation's `Result`. The
//! callback's `Err` is a rejection; a panic while *starting* the operation
//! is a crash.
//!
//! Completions made while the starting function is still running are held
//! until it returns, and the last one wins. After that the first completion
//! settles the session; later ones, and any completion after cancellation,
//! are ignored.
//!
//! When the operation completes on another thread, convert the callback
//! with [`NodeDone::into_remote`]. This needs a host that can receive
//! callbacks from other threads (the [`EventLoop`](crate::runtime::EventLoop)).
//! Once the session settles or is cancelled its remote callbacks are
//! unparked, and completing them does nothing.

use super::computation::{Computation, Continuation, Interpret};
use crate::cx::Cx;
use crate::runtime::event_loop::{Payload, Ticket};
use crate::tracing_compat::trace;
use crate::types::{catch, Cancel};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Starting,
    Waiting,
    Closed,
}

struct NodeSession<T, E> {
    k: Continuation<T, E>,
    phase: Cell<Phase>,
    pending: RefCell<Option<Result<T, E>>>,
    remotes: RefCell<Vec<Cancel>>,
}

impl<T: 'static, E: 'static> NodeSession<T, E> {
    fn complete(&self, result: Result<T, E>) {
        match self.phase.get() {
            Phase::Starting => *self.pending.borrow_mut() = Some(result),
            Phase::Waiting => {
                self.close();
                self.deliver(result);
            }
            Phase::Closed => {
                trace!("late Future.node completion ignored");
            }
        }
    }

    /// Closes the session and unparks its remote callbacks.
    fn close(&self) {
        self.phase.set(Phase::Closed);
        let remotes = std::mem::take(&mut *self.remotes.borrow_mut());
        for remote in remotes {
            remote.cancel();
        }
    }

    fn deliver(&self, result: Result<T, E>) {
        match result {
            Ok(value) => self.k.resolve(value),
            Err(reason) => self.k.reject(reason),
        }
    }
}

/// The completion callback handed to a [`node`] operation.
///
/// Clones complete the same session.
pub struct NodeDone<T, E> {
    session: Rc<NodeSession<T, E>>,
}

impl<T, E> Clone for NodeDone<T, E> {
    fn clone(&self) -> Self {
        Self {
            session: Rc::clone(&self.session),
        }
    }
}

impl<T: 'static, E: 'static> NodeDone<T, E> {
    /// Completes the operation.
    pub fn complete(&self, result: Result<T, E>) {
        self.session.complete(result);
    }

    /// Returns false once the session settled or was cancelled.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.session.phase.get() != Phase::Closed
    }
}

impl<T: Send + 'static, E: Send + 'static> NodeDone<T, E> {
    /// Converts this callback into one that can complete from any thread.
    ///
    /// The callback is parked on the host until the returned handle
    /// completes or is dropped, or the session closes; the host stays busy
    /// meanwhile. Returns
    /// `None` if the host cannot receive callbacks from other threads.
    #[must_use]
    pub fn into_remote(self, cx: &Cx) -> Option<RemoteDone<T, E>> {
        let session = Rc::clone(&self.session);
        let ticket = cx.park(Box::new(move |payload: Payload| {
            if let Ok(result) = payload.downcast::<Result<T, E>>() {
                self.complete(*result);
            }
        }))?;
        let unpark = cx.unparker(&ticket);
        if session.phase.get() == Phase::Closed {
            unpark.cancel();
        } else {
            session.remotes.borrow_mut().push(unpark);
        }
        Some(RemoteDone {
            ticket,
            _result: PhantomData,
        })
    }
}

impl<T, E> fmt::Debug for NodeDone<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDone")
            .field("phase", &self.session.phase.get())
            .finish_non_exhaustive()
    }
}

/// A `Send` completion callback for a [`node`] operation.
///
/// Dropping it without completing releases the host without settling the
/// session.
pub struct RemoteDone<T, E> {
    ticket: Ticket,
    _result: PhantomData<fn(Result<T, E>)>,
}

impl<T: Send + 'static, E: Send + 'static> RemoteDone<T, E> {
    /// Completes the operation from any thread.
    pub fn complete(self, result: Result<T, E>) {
        self.ticket.deliver(Box::new(result));
    }
}

impl<T, E> fmt::Debug for RemoteDone<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDone")
            .field("ticket", &self.ticket)
            .finish()
    }
}

struct Node<F> {
    start: F,
}

impl<T, E, F> Interpret<T, E> for Node<F>
where
    T: 'static,
    E: 'static,
    F: Fn(&Cx, NodeDone<T, E>),
{
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let session = Rc::new(NodeSession {
            k,
            phase: Cell::new(Phase::Starting),
            pending: RefCell::new(None),
            remotes: RefCell::new(Vec::new()),
        });
        let done = NodeDone {
            session: Rc::clone(&session),
        };
        if let Err(crash) = catch(|| (self.start)(cx, done)) {
            session.close();
            session.pending.borrow_mut().take();
            session
                .k
                .crash(crash.context("Future.node was executing its operation"));
            return Cancel::noop();
        }

        let pending = session.pending.borrow_mut().take();
        if let Some(result) = pending {
            session.close();
            session.deliver(result);
        } else {
            session.phase.set(Phase::Waiting);
        }
        Cancel::new(move || session.close())
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Future.node(..)")
    }
}

/// Adapts an operation that reports back through a completion callback.
///
/// ```
/// use trifuture::future::node;
/// use trifuture::lab::LabRuntime;
/// use trifuture::types::Outcome;
/// use std::time::Duration;
///
/// let read = node::<String, String, _>(|cx, done| {
///     cx.schedule(Duration::from_millis(3), move || done.complete(Ok("contents".into())));
/// });
/// let lab = LabRuntime::default();
/// assert_eq!(lab.block_on(&read), Some(Outcome::Resolve("contents".to_string())));
/// ```
pub fn node<T, E, F>(start: F) -> Computation<T, E>
where
    T: 'static,
    E: 'static,
    F: Fn(&Cx, NodeDone<T, E>) + 'static,
{
    Computation::from_interpret(Node { start })
}
