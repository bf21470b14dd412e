//! Capacity-bounded particle pools.
//!
//! A [`BoundedPool`] never grows past its capacity. Inserting into a full
//! pool drops the item and bumps a counter instead of allocating or
//! panicking, so overflow is observable through [`BoundedPool::dropped`]
//! and [`crate::EngineStats`]. The first overflow of each pool is logged at
//! `warn` level; later ones are only counted.

use log::warn;

/// Vec with a hard capacity and a drop counter.
#[derive(Clone, Debug)]
pub struct BoundedPool<T> {
    items: Vec<T>,
    capacity: usize,
    dropped: u64,
    label: &'static str,
}

impl<T> BoundedPool<T> {
    /// Create an empty pool. `label` names the pool in log output.
    pub fn new(label: &'static str, capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
            label,
        }
    }

    /// Insert `item`, or drop it if the pool is full.
    ///
    /// Returns `true` if the item was stored.
    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() < self.capacity {
            self.items.push(item);
            true
        } else {
            self.record_drop();
            false
        }
    }

    /// Count a drop without offering an item (used when a budget shared
    /// between pools is exhausted).
    pub fn record_drop(&mut self) {
        if self.dropped == 0 {
            warn!(
                "{} pool is full ({} entries); further insertions are dropped",
                self.label, self.capacity
            );
        }
        self.dropped += 1;
    }

    /// Count `count` drops at once.
    pub fn record_drops(&mut self, count: u64) {
        if count > 0 {
            self.record_drop();
            self.dropped += count - 1;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of insertions rejected since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Keep only the items for which `keep` returns `true`, preserving order.
    pub fn retain_mut(&mut self, keep: impl FnMut(&mut T) -> bool) {
        self.items.retain_mut(keep);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

impl<'a, T> IntoIterator for &'a BoundedPool<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
