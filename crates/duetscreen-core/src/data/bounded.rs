//! Fixed-capacity slot list
//!
//! Tools, axes and directory listings are bounded by what the display can
//! show. A `BoundedList` never grows past its capacity; extra entries are
//! dropped. Refreshing a list always goes through [`BoundedList::clear`]
//! first, so no entry from an earlier response survives.

use serde::{Deserialize, Serialize};

/// Ordered list with a hard capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedList<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> BoundedList<T> {
    /// Create an empty list holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry; returns `false` and drops it when the list is full
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() {
            tracing::trace!(capacity = self.capacity, "bounded list full, entry dropped");
            return false;
        }
        self.items.push(item);
        true
    }

    /// Release every slot
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Clear the list and fill it from `items`, returning how many were dropped
    pub fn replace_with<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        self.clear();
        let mut dropped = 0;
        for item in items {
            if !self.push(item) {
                dropped += 1;
            }
        }
        dropped
    }

    /// Shorten the list to `len` entries
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.items.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.items.get_mut(slot)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Grow the list with `fill` until `slot` exists, if capacity allows
    pub fn slot_or_fill(&mut self, slot: usize, mut fill: impl FnMut(usize) -> T) -> Option<&mut T> {
        if slot >= self.capacity {
            return None;
        }
        while self.items.len() <= slot {
            let next = self.items.len();
            self.items.push(fill(next));
        }
        self.items.get_mut(slot)
    }
}

impl<'a, T> IntoIterator for &'a BoundedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
