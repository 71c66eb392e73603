//! Cancellation handles and the per-session holders that fan out to them.
//!
//! Interpreting a computation returns a [`Cancel`]. Calling it before the
//! session settles guarantees that no continuation fires afterwards and asks
//! in-flight leaves to stop their effect (clear a timer, mark a callback
//! stale). Calling it after settlement, or a second time, does nothing.
//!
//! Composite sessions do not reassign a single closure in place. Instead
//! they hold their live child handles in explicit containers:
//!
//! - [`CancelSlot`]: one live child at a time (sequential combinators)
//! - [`CancelSet`]: an indexed set of live children (concurrent combinators)
//!
//! Both remember that they were cancelled, so a child handle registered
//! afterwards is cancelled on arrival.

use crate::tracing_compat::trace;
use core::fmt;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Why a session cancelled one of its children.
///
/// Only used for diagnostics; every kind has the same effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelKind {
    /// The caller invoked the handle it was given.
    User,
    /// A sibling failed and the remaining children are no longer needed.
    FailFast,
    /// Another branch of a race settled first.
    RaceLost,
    /// The enclosing session was cancelled.
    ParentCancelled,
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::FailFast => write!(f, "fail-fast"),
            Self::RaceLost => write!(f, "race lost"),
            Self::ParentCancelled => write!(f, "parent cancelled"),
        }
    }
}

struct CancelInner {
    action: Cell<Option<Box<dyn FnOnce()>>>,
}

/// An idempotent, nullary cancellation handle.
///
/// Clones share the same underlying action, which runs at most once across
/// all of them.
#[derive(Clone)]
pub struct Cancel {
    inner: Rc<CancelInner>,
}

impl Cancel {
    /// A handle that does nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            inner: Rc::new(CancelInner {
                action: Cell::new(None),
            }),
        }
    }

    /// Creates a handle that runs `action` on its first invocation.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            inner: Rc::new(CancelInner {
                action: Cell::new(Some(Box::new(action))),
            }),
        }
    }

    /// Creates a handle that cancels every handle in `handles`, in order.
    pub fn all(handles: impl IntoIterator<Item = Self>) -> Self {
        let handles: Vec<Self> = handles.into_iter().collect();
        Self::new(move || {
            for handle in handles {
                handle.cancel();
            }
        })
    }

    /// Runs the cancellation action if it has not run yet.
    pub fn cancel(&self) {
        if let Some(action) = self.inner.action.take() {
            action();
        }
    }

    /// Returns true if the action has already run (or there never was one).
    #[must_use]
    pub fn is_spent(&self) -> bool {
        let action = self.inner.action.take();
        let spent = action.is_none();
        self.inner.action.set(action);
        spent
    }
}

impl Default for Cancel {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("spent", &self.is_spent())
            .finish()
    }
}

enum SlotState {
    Vacant,
    Live(Cancel),
    Cancelled,
}

/// Holds the cancellation handle of the child a sequential session is
/// currently waiting on.
///
/// The slot moves between children as the session progresses. Every move
/// starts a new epoch: a handle offered for an earlier epoch belongs to a
/// child that already settled and is dropped. Once the slot is cancelled it
/// stays cancelled, and any handle stored later is cancelled immediately.
pub struct CancelSlot {
    state: RefCell<SlotState>,
    epoch: Cell<u64>,
}

impl CancelSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(SlotState::Vacant),
            epoch: Cell::new(0),
        }
    }

    /// Makes `handle` the live handle, replacing whatever was there.
    pub fn set(&self, handle: Cancel) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, SlotState::Cancelled) {
            drop(state);
            handle.cancel();
        } else {
            let previous = std::mem::replace(&mut *state, SlotState::Live(handle));
            drop(state);
            drop(previous);
        }
    }

    /// Stores `handle` only if no other handle has been stored since the
    /// slot was last emptied.
    ///
    /// Used for the handle returned by a child's `interpret`: if the child
    /// settled synchronously and the session already moved on to the next
    /// child, the stale handle must not overwrite the newer one.
    pub fn offer(&self, handle: Cancel) {
        let mut state = self.state.borrow_mut();
        match *state {
            SlotState::Vacant => *state = SlotState::Live(handle),
            SlotState::Cancelled => {
                drop(state);
                handle.cancel();
            }
            SlotState::Live(_) => {}
        }
    }

    /// The current epoch. It advances on every [`clear`](Self::clear).
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// Stores `handle` if the slot is still in `epoch`.
    ///
    /// A session sharing its slot with the children it finishes with reads
    /// the epoch before starting a child and offers the child's handle with
    /// it. If the slot moved on in between, the child has settled and its
    /// handle is stale.
    pub fn offer_at(&self, epoch: u64, handle: Cancel) {
        if self.is_cancelled() {
            handle.cancel();
        } else if self.epoch.get() == epoch {
            self.offer(handle);
        }
    }

    /// Empties the slot without cancelling the handle it held, and starts a
    /// new epoch.
    pub fn clear(&self) {
        self.epoch.set(self.epoch.get().wrapping_add(1));
        let mut state = self.state.borrow_mut();
        if let SlotState::Live(_) = *state {
            let previous = std::mem::replace(&mut *state, SlotState::Vacant);
            drop(state);
            drop(previous);
        }
    }

    /// Cancels the live handle (if any) and marks the slot cancelled.
    pub fn cancel(&self) {
        let previous = self.state.replace(SlotState::Cancelled);
        if let SlotState::Live(handle) = previous {
            handle.cancel();
        }
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.state.borrow(), SlotState::Cancelled)
    }

    /// Returns a handle that cancels this slot.
    pub fn handle(slot: &Rc<Self>) -> Cancel {
        let slot = Rc::clone(slot);
        Cancel::new(move || slot.cancel())
    }
}

impl Default for CancelSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.state.borrow() {
            SlotState::Vacant => "vacant",
            SlotState::Live(_) => "live",
            SlotState::Cancelled => "cancelled",
        };
        f.debug_struct("CancelSlot").field("state", &state).finish()
    }
}

/// The live handles of a concurrent session's children, by child index.
pub struct CancelSet {
    live: RefCell<Vec<Option<Cancel>>>,
    cancelled: Cell<bool>,
}

impl CancelSet {
    /// Creates an empty set sized for `capacity` children.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            live: RefCell::new(Vec::with_capacity(capacity)),
            cancelled: Cell::new(false),
        }
    }

    /// Registers the handle of the child at `index`.
    ///
    /// If the set was already cancelled the handle is cancelled immediately.
    pub fn insert(&self, index: usize, handle: Cancel) {
        if self.cancelled.get() {
            handle.cancel();
            return;
        }
        let mut live = self.live.borrow_mut();
        if live.len() <= index {
            live.resize_with(index + 1, || None);
        }
        live[index] = Some(handle);
    }

    /// Forgets the handle of a child that has settled.
    pub fn remove(&self, index: usize) -> Option<Cancel> {
        self.live
            .borrow_mut()
            .get_mut(index)
            .and_then(Option::take)
    }

    /// Returns the number of registered, unsettled children.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.borrow().iter().filter(|h| h.is_some()).count()
    }

    /// Returns true once [`cancel_all`](Self::cancel_all) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Cancels every live child and marks the set cancelled.
    ///
    /// Handles are taken out of the set before any of them runs, so a
    /// cancellation action may re-enter the set safely.
    pub fn cancel_all(&self, kind: CancelKind) {
        self.cancelled.set(true);
        let handles: Vec<Cancel> = self.live.borrow_mut().drain(..).flatten().collect();
        if !handles.is_empty() {
            trace!(kind = %kind, count = handles.len(), "cancelling live children");
        }
        for handle in handles {
            handle.cancel();
        }
    }

    /// Returns a handle that cancels every live child of this set.
    pub fn handle(set: &Rc<Self>) -> Cancel {
        let set = Rc::clone(set);
        Cancel::new(move || set.cancel_all(CancelKind::ParentCancelled))
    }
}

impl fmt::Debug for CancelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSet")
            .field("live", &self.live_count())
            .field("cancelled", &self.cancelled.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, Cancel) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, Cancel::new(move || c.set(c.get() + 1)))
    }

    #[test]
    fn cancel_runs_once() {
        let (count, handle) = counter();
        assert!(!handle.is_spent());
        handle.cancel();
        handle.cancel();
        handle.clone().cancel();
        assert_eq!(count.get(), 1);
        assert!(handle.is_spent());
    }

    #[test]
    fn noop_is_spent() {
        let handle = Cancel::noop();
        assert!(handle.is_spent());
        handle.cancel();
    }

    #[test]
    fn all_fans_out() {
        let (a, ha) = counter();
        let (b, hb) = counter();
        let both = Cancel::all([ha, hb]);
        both.cancel();
        both.cancel();
        assert_eq!((a.get(), b.get()), (1, 1));
    }

    #[test]
    fn slot_offer_does_not_replace_newer_handle() {
        let slot = Rc::new(CancelSlot::new());
        let (first, h1) = counter();
        let (second, h2) = counter();

        slot.set(h2);
        slot.offer(h1);
        CancelSlot::handle(&slot).cancel();

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
        assert!(slot.is_cancelled());
    }

    #[test]
    fn slot_cancels_late_arrivals() {
        let slot = CancelSlot::new();
        slot.cancel();

        let (a, ha) = counter();
        let (b, hb) = counter();
        slot.set(ha);
        slot.offer(hb);
        assert_eq!((a.get(), b.get()), (1, 1));
    }

    #[test]
    fn slot_drops_offers_from_an_earlier_epoch() {
        let slot = Rc::new(CancelSlot::new());
        let (stale, h1) = counter();
        let (current, h2) = counter();

        let first = slot.epoch();
        slot.clear();
        let second = slot.epoch();
        assert_ne!(first, second);

        slot.offer_at(first, h1);
        slot.offer_at(second, h2);
        CancelSlot::handle(&slot).cancel();

        assert_eq!(stale.get(), 0);
        assert_eq!(current.get(), 1);
    }

    #[test]
    fn slot_offer_at_cancels_after_cancel() {
        let slot = CancelSlot::new();
        let epoch = slot.epoch();
        slot.cancel();
        let (count, handle) = counter();
        slot.offer_at(epoch.wrapping_sub(1), handle);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn slot_clear_keeps_handle_alive() {
        let slot = CancelSlot::new();
        let (count, handle) = counter();
        slot.set(handle);
        slot.clear();
        slot.cancel();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn set_cancels_only_live_children() {
        let set = Rc::new(CancelSet::with_capacity(3));
        let (a, ha) = counter();
        let (b, hb) = counter();
        let (c, hc) = counter();
        set.insert(0, ha);
        set.insert(1, hb);
        set.insert(2, hc);
        assert_eq!(set.live_count(), 3);

        assert!(set.remove(1).is_some());
        CancelSet::handle(&set).cancel();

        assert_eq!((a.get(), b.get(), c.get()), (1, 0, 1));
        assert!(set.is_cancelled());
        assert_eq!(set.live_count(), 0);
    }

    #[test]
    fn set_cancels_late_arrivals() {
        let set = CancelSet::with_capacity(1);
        set.cancel_all(CancelKind::User);
        let (count, handle) = counter();
        set.insert(4, handle);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn cancel_kind_display() {
        assert_eq!(CancelKind::FailFast.to_string(), "fail-fast");
        assert_eq!(CancelKind::RaceLost.to_string(), "race lost");
    }
}
