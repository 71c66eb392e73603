//! Depth-bounded synchronous run queue.
//!
//! Sequential combinators start their next child from inside the previous
//! child's continuation. When children settle synchronously, that nests one
//! call inside the next with no bound. [`Trampoline::bounce`] runs a job in
//! place while the nesting depth is small and queues it otherwise; the
//! outermost bounce drains the queue before returning, so all synchronous
//! work still completes before the outermost call returns.

use crate::tracing_compat::trace;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

/// Nesting depth beyond which jobs are queued instead of run in place.
pub(crate) const MAX_DEPTH: usize = 64;

type Job = Box<dyn FnOnce()>;

pub(crate) struct Trampoline {
    depth: Cell<usize>,
    queue: RefCell<VecDeque<Job>>,
}

struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
    restore: usize,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.restore);
    }
}

impl Trampoline {
    pub(crate) fn new() -> Self {
        Self {
            depth: Cell::new(0),
            queue: RefCell::new(VecDeque::new()),
        }
    }

    /// Runs `job` now, or queues it if the nesting depth is exhausted.
    pub(crate) fn bounce(&self, job: impl FnOnce() + 'static) {
        let depth = self.depth.get();
        if depth >= MAX_DEPTH {
            self.queue.borrow_mut().push_back(Box::new(job));
            return;
        }
        {
            let _guard = self.enter(depth + 1, depth);
            job();
        }
        if depth == 0 {
            self.drain();
        }
    }

    fn drain(&self) {
        let mut ran = 0usize;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(job) = next else {
                break;
            };
            let _guard = self.enter(1, 0);
            job();
            ran += 1;
        }
        if ran > 0 {
            trace!(jobs = ran, "trampoline drained");
        }
    }

    fn enter(&self, depth: usize, restore: usize) -> DepthGuard<'_> {
        self.depth.set(depth);
        DepthGuard {
            depth: &self.depth,
            restore,
        }
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("depth", &self.depth.get())
            .field("queued", &self.queued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn nest(trampoline: &Rc<Trampoline>, remaining: usize, log: &Rc<RefCell<Vec<usize>>>) {
        if remaining == 0 {
            return;
        }
        let inner = Rc::clone(trampoline);
        let log = Rc::clone(log);
        trampoline.bounce(move || {
            log.borrow_mut().push(remaining);
            nest(&inner, remaining - 1, &log);
        });
    }

    #[test]
    fn deep_nesting_is_queued_and_drained() {
        let trampoline = Rc::new(Trampoline::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        nest(&trampoline, 100_000, &log);

        let log = log.borrow();
        assert_eq!(log.len(), 100_000);
        assert_eq!(log.first(), Some(&100_000));
        assert_eq!(log.last(), Some(&1));
        assert_eq!(trampoline.queued(), 0);
        assert_eq!(trampoline.depth.get(), 0);
    }

    #[test]
    fn shallow_jobs_run_in_place() {
        let trampoline = Trampoline::new();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        trampoline.bounce(move || flag.set(true));
        assert!(ran.get());
    }
}
