//! Running a cleanup computation after another settles.
//!
//! `lastly(m, cleanup)` interprets `cleanup` once `m` resolves or rejects,
//! then delivers `m`'s outcome. A rejection or crash of `cleanup` replaces
//! that outcome. A crash of `m` is forwarded at once without running
//! `cleanup`.
//!
//! Unlike [`hook`](super::hook()), cancelling before `m` settles skips the
//! cleanup entirely.

use super::chain::{start_next, start_parent};
use crate::cx::Cx;
use crate::future::{Computation, Continuation, Interpret};
use crate::types::{Cancel, CancelSlot};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct Lastly<T: 'static, U: 'static, E: 'static> {
    m: Computation<T, E>,
    cleanup: Computation<U, E>,
}

impl<T: 'static, U: 'static, E: 'static> Drop for Lastly<T, U, E> {
    fn drop(&mut self) {
        self.m.take().release();
        self.cleanup.take().release();
    }
}

impl<T, U, E> Interpret<T, E> for Lastly<T, U, E>
where
    T: 'static,
    U: 'static,
    E: 'static,
{
    fn interpret(&self, cx: &Cx, k: Continuation<T, E>) -> Cancel {
        let slot = Rc::new(CancelSlot::new());
        let pending: Rc<RefCell<Option<Result<T, E>>>> = Rc::new(RefCell::new(None));

        let cleanup_k = {
            let pending = Rc::clone(&pending);
            let deliver = k.clone();
            k.on_resolve(move |_: U| match pending.borrow_mut().take() {
                Some(Ok(value)) => deliver.resolve(value),
                Some(Err(reason)) => deliver.reject(reason),
                None => {}
            })
        };
        let run_cleanup: Rc<dyn Fn(Result<T, E>)> = {
            let cleanup = self.cleanup.clone();
            let slot = Rc::clone(&slot);
            let cx = cx.clone();
            Rc::new(move |result: Result<T, E>| {
                *pending.borrow_mut() = Some(result);
                let cleanup = cleanup.clone();
                start_next(&cx, &slot, cleanup_k.clone(), move || cleanup, |crash| crash);
            })
        };

        let on_reject = Rc::clone(&run_cleanup);
        let parent_k = k.on_reject(move |reason: E| on_reject(Err(reason)));
        let parent_k = parent_k.on_resolve(move |value: T| run_cleanup(Ok(value)));
        start_parent(cx, &slot, &self.m, parent_k);
        CancelSlot::handle(&slot)
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.lastly({})", self.m, self.cleanup)
    }
}

/// Runs `cleanup` after `m` resolves or rejects.
///
/// ```
/// use trifuture::combinator::lastly;
/// use trifuture::future::{after, reject};
/// use trifuture::lab::LabRuntime;
/// use trifuture::types::{Delay, Outcome};
///
/// let m = lastly(reject::<u8, &str>("failed"), after(Delay::from_millis(5), ()));
/// let lab = LabRuntime::default();
/// assert_eq!(lab.block_on(&m), Some(Outcome::Reject("failed")));
/// assert_eq!(lab.now().as_millis(), 5);
/// ```
pub fn lastly<T, U, E>(m: Computation<T, E>, cleanup: Computation<U, E>) -> Computation<T, E>
where
    T: 'static,
    U: 'static,
    E: 'static,
{
    Computation::from_interpret(Lastly { m, cleanup })
}

impl<T: 'static, E: 'static> Computation<T, E> {
    /// Method form of [`lastly`].
    #[must_use]
    pub fn lastly<U: 'static>(&self, cleanup: &Computation<U, E>) -> Self {
        lastly(self.clone(), cleanup.clone())
    }
}
