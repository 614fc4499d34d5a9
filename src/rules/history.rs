//! Historical round cache.
//!
//! Fixed-capacity ring buffer of the most recent completed rounds, kept in
//! chronological order. Appends are O(1); once full, each append overwrites
//! the oldest slot. Records are never mutated after insertion.

use crate::types::RoundRecord;

/// Default number of rounds retained.
pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct HistoricalCache {
    slots: Vec<RoundRecord>,
    /// Index of the oldest record once the buffer has wrapped.
    head: usize,
    capacity: usize,
}

impl HistoricalCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn push(&mut self, record: RoundRecord) {
        if self.slots.len() < self.capacity {
            self.slots.push(record);
        } else {
            self.slots[self.head] = record;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &RoundRecord> + '_ {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// Most recent completed round.
    pub fn latest(&self) -> Option<&RoundRecord> {
        self.iter().next_back()
    }

    /// Up to `k` most recent rounds, oldest first.
    pub fn last_n(&self, k: usize) -> Vec<&RoundRecord> {
        let skip = self.len().saturating_sub(k);
        self.iter().skip(skip).collect()
    }

    /// Up to `k` most recent multipliers, oldest first.
    pub fn last_multipliers(&self, k: usize) -> Vec<f64> {
        self.last_n(k).into_iter().map(|r| r.multiplier).collect()
    }

    /// Every cached multiplier, oldest first.
    pub fn multipliers(&self) -> Vec<f64> {
        self.iter().map(|r| r.multiplier).collect()
    }
}

impl Default for HistoricalCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
