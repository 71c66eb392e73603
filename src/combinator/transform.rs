//! Synchronous transformations of a settled outcome.
//!
//! [`map`], [`map_rej`], [`bimap`], [`fold`] and [`swap`] all apply a plain
//! function to the parent's rejection or value. Crashes pass through
//! untouched; a panic in the function is a crash naming the
//! transformation.

use super::chain::start_parent;
use crate::cx::Cx;
use crate::future::{Computation, Continuation, Interpret};
use crate::types::{catch, Cancel, CancelSlot};
use std::fmt;
use std::rc::Rc;

struct Transform<T: 'static, E: 'static, F> {
    parent: Computation<T, E>,
    phase: &'static str,
    label: &'static str,
    f: Rc<F>,
}

impl<T: 'static, E: 'static, F> Drop for Transform<T, E, F> {
    fn drop(&mut self) {
        self.parent.take().release();
    }
}

impl<T, E, U, G, F> Interpret<U, G> for Transform<T, E, F>
where
    T: 'static,
    E: 'static,
    U: 'static,
    G: 'static,
    F: Fn(Result<T, E>) -> Result<U, G> + 'static,
{
    fn interpret(&self, cx: &Cx, k: Continuation<U, G>) -> Cancel {
        let slot = Rc::new(CancelSlot::new());
        let apply: Rc<dyn Fn(Result<T, E>)> = {
            let f = Rc::clone(&self.f);
            let parent = self.parent.clone();
            let (phase, label) = (self.phase, self.label);
            let slot = Rc::clone(&slot);
            let cx = cx.clone();
            let k = k.clone();
            Rc::new(move |result: Result<T, E>| {
                let f = Rc::clone(&f);
                let parent = parent.clone();
                let slot = Rc::clone(&slot);
                let k = k.clone();
                slot.clear();
                cx.bounce(move || {
                    if slot.is_cancelled() {
                        return;
                    }
                    match catch(|| f(result)) {
                        Ok(Ok(value)) => k.resolve(value),
                        Ok(Err(reason)) => k.reject(reason),
                        Err(crash) => {
                            k.crash(crash.context_in(phase, format!("{parent}.{label}")));
                        }
                    }
                });
            })
        };
        let on_reject = Rc::clone(&apply);
        let parent_k = Continuation::new(
            move |crash| k.crash(crash),
            move |reason| on_reject(Err(reason)),
            move |value| apply(Ok(value)),
        );
        start_parent(cx, &slot, &self.parent, parent_k);
        CancelSlot::handle(&slot)
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.parent, self.label)
    }
}

fn transform<T, E, U, G>(
    parent: Computation<T, E>,
    phase: &'static str,
    label: &'static str,
    f: impl Fn(Result<T, E>) -> Result<U, G> + 'static,
) -> Computation<U, G>
where
    T: 'static,
    E: 'static,
    U: 'static,
    G: 'static,
{
    Computation::from_interpret(Transform {
        parent,
        phase,
        label,
        f: Rc::new(f),
    })
}

/// Applies `f` to the value of `m`.
pub fn map<T, U, E>(m: Computation<T, E>, f: impl Fn(T) -> U + 'static) -> Computation<U, E>
where
    T: 'static,
    U: 'static,
    E: 'static,
{
    transform(m, "Future.map was calling its function", "map(..)", move |r| {
        r.map(&f)
    })
}

/// Applies `f` to the rejection of `m`.
pub fn map_rej<T, E, G>(m: Computation<T, E>, f: impl Fn(E) -> G + 'static) -> Computation<T, G>
where
    T: 'static,
    E: 'static,
    G: 'static,
{
    transform(
        m,
        "Future.mapRej was calling its function",
        "mapRej(..)",
        move |r| r.map_err(&f),
    )
}

/// Applies `on_reject` to a rejection or `on_resolve` to a value.
pub fn bimap<T, E, U, G>(
    m: Computation<T, E>,
    on_reject: impl Fn(E) -> G + 'static,
    on_resolve: impl Fn(T) -> U + 'static,
) -> Computation<U, G>
where
    T: 'static,
    E: 'static,
    U: 'static,
    G: 'static,
{
    transform(
        m,
        "Future.bimap was calling one of its functions",
        "bimap(..)",
        move |r| r.map(&on_resolve).map_err(&on_reject),
    )
}

/// Folds both channels into a value; the result never rejects.
///
/// ```
/// use trifuture::combinator::fold;
/// use trifuture::future::reject;
/// use trifuture::lab::LabRuntime;
/// use trifuture::types::Outcome;
///
/// let m = fold::<u8, &str, String, ()>(reject("io"), |e| format!("failed: {e}"), |x| x.to_string());
/// assert_eq!(
///     LabRuntime::default().block_on(&m),
///     Some(Outcome::Resolve("failed: io".to_string()))
/// );
/// ```
pub fn fold<T, E, U, G>(
    m: Computation<T, E>,
    on_reject: impl Fn(E) -> U + 'static,
    on_resolve: impl Fn(T) -> U + 'static,
) -> Computation<U, G>
where
    T: 'static,
    E: 'static,
    U: 'static,
    G: 'static,
{
    transform(
        m,
        "Future.coalesce was calling one of its functions",
        "coalesce(..)",
        move |r| {
            Ok(match r {
                Ok(value) => on_resolve(value),
                Err(reason) => on_reject(reason),
            })
        },
    )
}

/// Exchanges the reject and resolve channels.
///
/// Leaves with a known outcome are relabelled without interpretation.
pub fn swap<T, E>(m: Computation<T, E>) -> Computation<E, T>
where
    T: 'static,
    E: 'static,
{
    if let Some(swapped) = m.static_swap() {
        return swapped;
    }
    transform(m, "Future.swap was relabelling", "swap()", |r| match r {
        Ok(value) => Err(value),
        Err(reason) => Ok(reason),
    })
}

impl<T: 'static, E: 'static> Computation<T, E> {
    /// Method form of [`map`].
    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> Computation<U, E> {
        map(self.clone(), f)
    }

    /// Method form of [`map_rej`].
    pub fn map_rej<G: 'static>(&self, f: impl Fn(E) -> G + 'static) -> Computation<T, G> {
        map_rej(self.clone(), f)
    }

    /// Method form of [`bimap`].
    pub fn bimap<U: 'static, G: 'static>(
        &self,
        on_reject: impl Fn(E) -> G + 'static,
        on_resolve: impl Fn(T) -> U + 'static,
    ) -> Computation<U, G> {
        bimap(self.clone(), on_reject, on_resolve)
    }

    /// Method form of [`fold`].
    pub fn fold<U: 'static, G: 'static>(
        &self,
        on_reject: impl Fn(E) -> U + 'static,
        on_resolve: impl Fn(T) -> U + 'static,
    ) -> Computation<U, G> {
        fold(self.clone(), on_reject, on_resolve)
    }

    /// Method form of [`swap`].
    #[must_use]
    pub fn swap(&self) -> Computation<E, T> {
        swap(self.clone())
    }
}
