//! Leaf computations: variants with no child computation.
//!
//! | Leaf | Settles | Race hint |
//! |------|---------|-----------|
//! | [`resolve`], [`reject`] | synchronously | `Settled` |
//! | [`never`] | never | `Never` |
//! | [`after`], [`reject_after`] | on the host timer | `Timed` |
//! | [`attempt`], [`encase`] | synchronously | `Dynamic` |
//!
//! [`attempt`] and [`encase`] treat an `Err` return as a rejection; only a
//! panic is a crash.

use super::computation::{Computation, Continuation, Interpret, RaceHint};
use crate::cx::Cx;
use crate::types::{catch, Cancel, Delay};
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

struct Resolved<T, E> {
    value: T,
    _reject: PhantomData<fn() -> E>,
}

impl<T: Clone + 'static, E: 'static> Interpret<T, E> for Resolved<T, E> {
    fn interpret(&self, _cx: &Cx, k: Continuation<T, E>) -> Cancel {
        k.resolve(self.value.clone());
        Cancel::noop()
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Future.of(..)")
    }

    fn race_hint(&self) -> RaceHint {
        RaceHint::Settled
    }

    fn swap(&self) -> Option<Computation<E, T>> {
        Some(reject(self.value.clone()))
    }
}

struct Rejected<T, E> {
    reason: E,
    _resolve: PhantomData<fn() -> T>,
}

impl<T: 'static, E: Clone + 'static> Interpret<T, E> for Rejected<T, E> {
    fn interpret(&self, _cx: &Cx, k: Continuation<T, E>) -> Cancel {
        k.reject(self.reason.clone());
        Cancel::noop()
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Future.reject(..)")
    }

    fn race_hint(&self) -> RaceHint {
        RaceHint::Settled
    }

    fn swap(&self) -> Option<Computation<E, T>> {
        Some(resolve(self.reason.clone()))
    }
}

struct Never<T, E> {
    _channels: PhantomData<fn() -> (T, E)>,
}

impl<T: 'static, E: 'static> Interpret<T, E> for Never<T, E> {
    fn interpret(&self, _cx: &Cx, _k: Continuation<T, E>) -> Cancel {
        Cancel::noop()
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Future.never")
    }

    fn race_hint(&self) -> RaceHint {
        RaceHint::Never
    }

    fn swap(&self) -> Option<Computation<E, T>> {
        Some(never())
    }
}

struct After<T, E> {
    delay: Duration,
    value: T,
    _reject: PhantomData<fn() -> E>,
}

impl<T: Clone + 'static, E: 'static> Interpret<T, E> for After<T, E> {
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let value = self.value.clone();
        let id = cx.schedule(self.delay, move || k.resolve(value));
        let cx = cx.clone();
        Cancel::new(move || cx.clear(id))
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe_timed("Future.after", self.delay, f)
    }

    fn race_hint(&self) -> RaceHint {
        RaceHint::Timed(self.delay)
    }

    fn swap(&self) -> Option<Computation<E, T>> {
        Some(Computation::from_interpret(RejectAfter {
            delay: self.delay,
            reason: self.value.clone(),
            _resolve: PhantomData,
        }))
    }
}

struct RejectAfter<T, E> {
    delay: Duration,
    reason: E,
    _resolve: PhantomData<fn() -> T>,
}

impl<T: 'static, E: Clone + 'static> Interpret<T, E> for RejectAfter<T, E> {
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let reason = self.reason.clone();
        let id = cx.schedule(self.delay, move || k.reject(reason));
        let cx = cx.clone();
        Cancel::new(move || cx.clear(id))
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe_timed("Future.rejectAfter", self.delay, f)
    }

    fn race_hint(&self) -> RaceHint {
        RaceHint::Timed(self.delay)
    }

    fn swap(&self) -> Option<Computation<E, T>> {
        Some(Computation::from_interpret(After {
            delay: self.delay,
            value: self.reason.clone(),
            _reject: PhantomData,
        }))
    }
}

fn describe_timed(name: &str, delay: Duration, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{name}({delay:?}, ..)")
}

struct Attempt<F> {
    f: F,
}

impl<T, E, F> Interpret<T, E> for Attempt<F>
where
    T: 'static,
    E: 'static,
    F: Fn() -> Result<T, E>,
{
    fn interpret(&self, _cx: &Cx, k: Continuation<T, E>) -> Cancel {
        match catch(|| (self.f)()) {
            Ok(Ok(value)) => k.resolve(value),
            Ok(Err(reason)) => k.reject(reason),
            Err(crash) => k.crash(crash.context("Future.attempt was executing its function")),
        }
        Cancel::noop()
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Future.attempt(..)")
    }
}

struct Encase<F, A> {
    f: F,
    arg: A,
}

impl<T, E, A, F> Interpret<T, E> for Encase<F, A>
where
    T: 'static,
    E: 'static,
    A: Clone,
    F: Fn(A) -> Result<T, E>,
{
    fn interpret(&self, _cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let arg = self.arg.clone();
        match catch(|| (self.f)(arg)) {
            Ok(Ok(value)) => k.resolve(value),
            Ok(Err(reason)) => k.reject(reason),
            Err(crash) => k.crash(crash.context("Future.encase was executing its function")),
        }
        Cancel::noop()
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Future.encase(..)")
    }
}

/// A computation that resolves with `value`.
pub fn resolve<T: Clone + 'static, E: 'static>(value: T) -> Computation<T, E> {
    Computation::from_interpret(Resolved {
        value,
        _reject: PhantomData,
    })
}

/// A computation that rejects with `reason`.
pub fn reject<T: 'static, E: Clone + 'static>(reason: E) -> Computation<T, E> {
    Computation::from_interpret(Rejected {
        reason,
        _resolve: PhantomData,
    })
}

/// A computation that never settles.
#[must_use]
pub fn never<T: 'static, E: 'static>() -> Computation<T, E> {
    Computation::from_interpret(Never {
        _channels: PhantomData,
    })
}

/// Resolves with `value` once `delay` elapses on the host timer.
///
/// [`Delay::Infinite`] yields [`never`].
pub fn after<T: Clone + 'static, E: 'static>(delay: Delay, value: T) -> Computation<T, E> {
    match delay {
        Delay::Finite(delay) => Computation::from_interpret(After {
            delay,
            value,
            _reject: PhantomData,
        }),
        Delay::Infinite => never(),
    }
}

/// Rejects with `reason` once `delay` elapses on the host timer.
///
/// [`Delay::Infinite`] yields [`never`].
pub fn reject_after<T: 'static, E: Clone + 'static>(delay: Delay, reason: E) -> Computation<T, E> {
    match delay {
        Delay::Finite(delay) => Computation::from_interpret(RejectAfter {
            delay,
            reason,
            _resolve: PhantomData,
        }),
        Delay::Infinite => never(),
    }
}

/// Runs `f` on every interpretation: `Ok` resolves, `Err` rejects.
pub fn attempt<T, E, F>(f: F) -> Computation<T, E>
where
    T: 'static,
    E: 'static,
    F: Fn() -> Result<T, E> + 'static,
{
    Computation::from_interpret(Attempt { f })
}

/// Runs `f(arg)` on every interpretation: `Ok` resolves, `Err` rejects.
pub fn encase<T, E, A, F>(f: F, arg: A) -> Computation<T, E>
where
    T: 'static,
    E: 'static,
    A: Clone + 'static,
    F: Fn(A) -> Result<T, E> + 'static,
{
    Computation::from_interpret(Encase { f, arg })
}
