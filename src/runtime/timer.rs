//! Timer heap for deadline management.
//!
//! A min-heap of `(deadline, id)` pairs plus a table of live timers. Cancelling
//! a timer only removes it from the table; the stale heap entry is skipped
//! when it reaches the top. Timers with equal deadlines fire in registration
//! order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::runtime::frame::Handle;
use crate::types::{Time, TimerId};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct TimerEntry {
    deadline: Time,
    id: TimerId,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of timers ordered by deadline.
#[derive(Debug, Default)]
pub struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    live: HashMap<TimerId, Handle>,
    next_id: u64,
}

impl TimerHeap {
    /// Creates a new empty timer heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if no timer is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Registers `handle` to be resumed at `deadline`.
    pub fn insert(&mut self, deadline: Time, handle: Handle) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(TimerEntry { deadline, id });
        self.live.insert(id, handle);
        id
    }

    /// Cancels a timer. Returns true if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.live.remove(&id).is_some()
    }

    /// Returns the earliest live deadline, if any.
    pub fn peek_deadline(&mut self) -> Option<Time> {
        self.discard_stale();
        self.heap.peek().map(|e| e.deadline)
    }

    /// Pops all timers that have expired (deadline <= now), earliest first.
    pub fn pop_expired(&mut self, now: Time) -> Vec<Handle> {
        let mut expired = Vec::new();
        loop {
            self.discard_stale();
            match self.heap.peek() {
                Some(entry) if entry.deadline <= now => {
                    let id = entry.id;
                    self.heap.pop();
                    if let Some(handle) = self.live.remove(&id) {
                        expired.push(handle);
                    }
                }
                _ => break,
            }
        }
        expired
    }

    /// Drops every timer.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    fn discard_stale(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.live.contains_key(&entry.id) {
                break;
            }
            self.heap.pop();
        }
    }
}
