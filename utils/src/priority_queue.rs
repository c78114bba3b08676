//! A binary min-heap keyed by an integer priority.
//!
//! Lower priorities are removed first. Items with equal priority come out in
//! an order decided by the heap layout, which is deterministic for a given
//! sequence of operations but not necessarily insertion order.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

/// An item stored alongside its priority.
struct Entry<V> {
    priority: Reverse<i64>,
    value: V,
}

// Entries compare by priority only so that `V` does not need to be ordered.
impl<V> PartialEq for Entry<V> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl<V> Eq for Entry<V> {}

impl<V> PartialOrd for Entry<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V> Ord for Entry<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

/// A min-heap of values keyed by an `i64` priority.
pub struct PriorityQueue<V> {
    heap: BinaryHeap<Entry<V>>,
}

impl<V> PriorityQueue<V> {
    /// Create a new, empty priority queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Insert `value` with `priority` in `O(log n)`.
    pub fn push(&mut self, priority: i64, value: V) {
        self.heap.push(Entry {
            priority: Reverse(priority),
            value,
        });
    }

    /// Remove and return the value with the lowest priority in `O(log n)`.
    pub fn pop(&mut self) -> Option<(i64, V)> {
        self.heap
            .pop()
            .map(|Entry { priority, value }| (priority.0, value))
    }

    /// Return the value with the lowest priority without removing it in `O(1)`.
    pub fn peek(&self) -> Option<(i64, &V)> {
        self.heap
            .peek()
            .map(|entry| (entry.priority.0, &entry.value))
    }

    /// Remove and return the lowest-priority value if its priority is at most `limit`.
    pub fn pop_if_at_most(&mut self, limit: i64) -> Option<(i64, V)> {
        match self.heap.peek() {
            Some(entry) if entry.priority.0 <= limit => self.pop(),
            _ => None,
        }
    }

    /// Number of values in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue holds no values.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<V> Default for PriorityQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}
