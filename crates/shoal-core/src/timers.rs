//! Deferred actions scheduled against the simulation clock.
//!
//! Nothing here sleeps. Callers poll [`TimerQueue::pop_due`] once per tick
//! and act on whatever fell due.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use ordered_float::OrderedFloat;

/// Handle returned by [`TimerQueue::schedule`] for targeted cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<T> {
    due: OrderedFloat<f64>,
    id: TimerId,
    payload: T,
}

impl<T> Entry<T> {
    fn key(&self) -> (OrderedFloat<f64>, TimerId) {
        (self.due, self.id)
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Min-heap of `(due, payload)`; equal due times fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    cancelled: HashSet<TimerId>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_id: 0,
        }
    }

    /// Schedule `payload` to fire once the clock reaches `due`.
    pub fn schedule(&mut self, due: f64, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let due = if due.is_nan() { 0.0 } else { due };
        self.heap.push(Reverse(Entry {
            due: OrderedFloat(due),
            id,
            payload,
        }));
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let pending = self
            .heap
            .iter()
            .any(|Reverse(entry)| entry.id == id && !self.cancelled.contains(&id));
        if pending {
            self.cancelled.insert(id);
        }
        pending
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.cancelled.clear();
    }

    /// Pop the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<(f64, T)> {
        loop {
            let Reverse(head) = self.heap.peek()?;
            if head.due.0 > now {
                return None;
            }
            let Reverse(entry) = self.heap.pop()?;
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            return Some((entry.due.0, entry.payload));
        }
    }

    /// Due time of the earliest live timer.
    #[must_use]
    pub fn next_due(&self) -> Option<f64> {
        self.heap
            .iter()
            .filter(|Reverse(entry)| !self.cancelled.contains(&entry.id))
            .map(|Reverse(entry)| entry.due)
            .min()
            .map(|due| due.0)
    }

    /// Iterate over live payloads in no particular order.
    pub fn payloads(&self) -> impl Iterator<Item = &T> + '_ {
        self.heap
            .iter()
            .filter(|Reverse(entry)| !self.cancelled.contains(&entry.id))
            .map(|Reverse(entry)| &entry.payload)
    }

    /// Number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len() - self.cancelled.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
