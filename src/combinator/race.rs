//! Race combinator: run two computations, first to settle wins.
//!
//! Both children are interpreted in the same session, left first. Whichever
//! settles first (through any channel) decides the outcome and the other is
//! cancelled immediately. If the left child settles before its `interpret`
//! returns, the right one is never started.
//!
//! # Static resolution
//!
//! Some races are decided by the children's [`RaceHint`]s alone, and are
//! reduced to the winner at construction without interpreting the loser:
//!
//! ```text
//! race(a, never)               = a
//! race(never, b)               = b
//! race(settled, b)             = settled
//! race(after(d), settled)      = settled
//! race(after(d1), after(d2))   = the strictly shorter, the left on a tie
//! ```
//!
//! Every other pairing runs the dynamic race, which yields the same outcome
//! for these cases.
//!
//! # Algebraic laws
//!
//! - Identity: `race(a, never) ≃ a`
//! - Associativity: `race(race(a, b), c) ≃ race(a, race(b, c))`

use crate::cx::Cx;
use crate::future::{reject_after, Computation, Continuation, Interpret, RaceHint};
use crate::tracing_compat::trace;
use crate::types::{Cancel, CancelKind, CancelSet, Delay, Outcome};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

const LEFT: usize = 0;
const RIGHT: usize = 1;

/// Which side of a race is decided without interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decided {
    Left,
    Right,
}

fn decide(left: RaceHint, right: RaceHint) -> Option<Decided> {
    match (left, right) {
        (RaceHint::Never, _) => Some(Decided::Right),
        (_, RaceHint::Never) | (RaceHint::Settled, _) => Some(Decided::Left),
        (RaceHint::Timed(_), RaceHint::Settled) => Some(Decided::Right),
        (RaceHint::Timed(a), RaceHint::Timed(b)) => {
            Some(if b < a { Decided::Right } else { Decided::Left })
        }
        _ => None,
    }
}

struct Race<T: 'static, E: 'static> {
    left: Computation<T, E>,
    right: Computation<T, E>,
}

impl<T: 'static, E: 'static> Drop for Race<T, E> {
    fn drop(&mut self) {
        self.left.take().release();
        self.right.take().release();
    }
}

struct RaceSession<T, E> {
    k: Continuation<T, E>,
    live: Rc<CancelSet>,
    settled: Cell<bool>,
}

impl<T: 'static, E: 'static> RaceSession<T, E> {
    fn continuation(self: &Rc<Self>, index: usize) -> Continuation<T, E> {
        let session = Rc::clone(self);
        Continuation::from_settle(move |outcome| session.won(index, outcome))
    }

    fn won(&self, index: usize, outcome: Outcome<T, E>) {
        if self.settled.replace(true) {
            return;
        }
        self.live.remove(index);
        trace!(
            winner = if index == LEFT { "left" } else { "right" },
            severity = ?outcome.severity(),
            "Future.race settled"
        );
        self.live.cancel_all(CancelKind::RaceLost);
        self.k.settle(outcome);
    }

    fn cancel(&self) {
        if self.settled.replace(true) {
            return;
        }
        self.live.cancel_all(CancelKind::ParentCancelled);
    }
}

impl<T: 'static, E: 'static> Interpret<T, E> for Race<T, E> {
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let session = Rc::new(RaceSession {
            k,
            live: Rc::new(CancelSet::with_capacity(2)),
            settled: Cell::new(false),
        });

        let handle = self.left.interpret(cx, session.continuation(LEFT));
        if session.settled.get() {
            return Cancel::noop();
        }
        session.live.insert(LEFT, handle);

        let handle = self.right.interpret(cx, session.continuation(RIGHT));
        if !session.settled.get() {
            session.live.insert(RIGHT, handle);
        }
        Cancel::new(move || session.cancel())
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Future.race({}, {})", self.left, self.right)
    }
}

/// Races `left` against `right`; the first to settle wins.
///
/// ```
/// use trifuture::combinator::race;
/// use trifuture::future::after;
/// use trifuture::lab::LabRuntime;
/// use trifuture::types::{Delay, Outcome};
///
/// let m = race(
///     after::<_, ()>(Delay::from_millis(10), 'a'),
///     after(Delay::from_millis(20), 'b'),
/// );
/// let lab = LabRuntime::default();
/// assert_eq!(lab.block_on(&m), Some(Outcome::Resolve('a')));
/// assert_eq!(lab.now().as_millis(), 10);
/// ```
pub fn race<T, E>(left: Computation<T, E>, right: Computation<T, E>) -> Computation<T, E>
where
    T: 'static,
    E: 'static,
{
    match decide(left.race_hint(), right.race_hint()) {
        Some(Decided::Left) => left,
        Some(Decided::Right) => right,
        None => Computation::from_interpret(Race { left, right }),
    }
}

/// Rejects with `reason` unless `m` settles within `delay`.
///
/// Equivalent to racing `m` against [`reject_after`]. A timed-out `m` is
/// cancelled.
pub fn timeout<T, E>(m: Computation<T, E>, delay: Delay, reason: E) -> Computation<T, E>
where
    T: 'static,
    E: Clone + 'static,
{
    race(m, reject_after(delay, reason))
}

impl<T: 'static, E: 'static> Computation<T, E> {
    /// Method form of [`race`].
    #[must_use]
    pub fn race(&self, other: &Self) -> Self {
        race(self.clone(), other.clone())
    }

    /// Method form of [`timeout`].
    #[must_use]
    pub fn timeout(&self, delay: Delay, reason: E) -> Self
    where
        E: Clone,
    {
        timeout(self.clone(), delay, reason)
    }
}
