//! Fixed-capacity top-k container.
//!
//! `BoundedMinSet` keeps the k smallest `(score, id)` pairs seen so far. It
//! is stored as a max-heap so the current worst element is at the root and
//! can be replaced in O(log k) when a better candidate arrives.
//!
//! Entries are ordered lexicographically by `(score, id)`: across equal
//! scores the smaller id wins. Applying that rule inside every comparison
//! makes the retained set exactly the k smallest elements under a strict
//! total order, so results do not depend on insertion order, thread count,
//! or block size.

use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

type Entry = (OrderedFloat<f32>, u32);

/// Bounded min-set of `(score, id)` pairs.
#[derive(Debug, Clone)]
pub struct BoundedMinSet {
    capacity: usize,
    heap: BinaryHeap<Entry>,
}

impl BoundedMinSet {
    /// Create an empty set retaining at most `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Insert `(score, id)`, evicting the current worst element if the set is
    /// full and the new pair ranks strictly better. Returns whether the pair
    /// was kept.
    pub fn insert(&mut self, score: f32, id: u32) -> bool {
        let entry: Entry = (OrderedFloat(score), id);
        if self.heap.len() < self.capacity {
            self.heap.push(entry);
            return true;
        }
        match self.heap.peek() {
            Some(worst) if entry < *worst => {
                self.heap.pop();
                self.heap.push(entry);
                true
            }
            _ => false,
        }
    }

    /// Like [`insert`](Self::insert) but refuses ids already present.
    pub fn insert_unique(&mut self, score: f32, id: u32) -> bool {
        if self.heap.iter().any(|&(_, existing)| existing == id) {
            return false;
        }
        self.insert(score, id)
    }

    /// Iterate over the retained pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (f32, u32)> + '_ {
        self.heap.iter().map(|&(s, id)| (s.0, id))
    }

    /// Consume the set, yielding pairs in ascending `(score, id)` order.
    pub fn drain_sorted(self) -> Vec<(f32, u32)> {
        let mut out: Vec<Entry> = self.heap.into_vec();
        out.sort_unstable();
        out.into_iter().map(|(s, id)| (s.0, id)).collect()
    }
}
