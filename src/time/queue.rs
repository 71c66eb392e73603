//! Deadline-ordered timer queue shared by the hosts.
//!
//! Timers live in a binary min-heap ordered by deadline, then by timer id,
//! so timers sharing a deadline fire in scheduling order. Clearing a timer
//! only forgets its id; the heap entry is discarded lazily when it reaches
//! the top.
//!
//! Due timers are popped one at a time. The host releases its borrow of the
//! queue before running the callback, so callbacks may schedule or clear
//! timers freely.

use crate::types::{Time, TimerId};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;

/// Callback run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce()>;

struct Entry {
    deadline: Time,
    id: TimerId,
    callback: TimerCallback,
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap ordering: earliest deadline first, then lowest id
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of pending timers with lazy cancellation.
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Entry>,
    pending: HashSet<TimerId>,
    next_id: u64,
}

impl TimerQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `callback` to run at `deadline`.
    pub fn insert(&mut self, deadline: Time, callback: TimerCallback) -> TimerId {
        let id = TimerId::from_raw(self.next_id);
        self.next_id += 1;
        self.pending.insert(id);
        self.heap.push(Entry {
            deadline,
            id,
            callback,
        });
        id
    }

    /// Forgets a timer. Returns true if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id)
    }

    /// Returns the number of timers that will still fire.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no timer will fire.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the earliest deadline among pending timers.
    pub fn next_deadline(&mut self) -> Option<Time> {
        self.discard_cancelled();
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// Removes and returns the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: Time) -> Option<(TimerId, TimerCallback)> {
        self.discard_cancelled();
        if self.heap.peek()?.deadline > now {
            return None;
        }
        let entry = self.heap.pop()?;
        self.pending.remove(&entry.id);
        Some((entry.id, entry.callback))
    }

    /// Drops every pending timer without running it.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }

    fn discard_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.pending.contains(&top.id) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.pending.len())
            .field("heap", &self.heap.len())
            .finish()
    }
}
