//! Insertion Order Module
//!
//! Tracks the order in which keys were stored so the store can evict the
//! entry with the oldest storage time. Reads never reorder keys.

use std::collections::{BTreeMap, HashMap};

// == Insertion Order ==
/// Orders keys by a monotonically increasing insertion sequence.
///
/// The sequence doubles as a deterministic tie-breaker: two entries stored at
/// the same instant are evicted in the order they were inserted.
#[derive(Debug, Default)]
pub struct InsertionOrder {
    next_seq: u64,
    by_seq: BTreeMap<u64, String>,
    by_key: HashMap<String, u64>,
}

impl InsertionOrder {
    pub fn new() -> Self {
        Self::default()
    }

    // == Record ==
    /// Marks `key` as the most recently stored key.
    ///
    /// Re-recording an existing key moves it to the back, matching the fresh
    /// storage time of an overwritten entry.
    pub fn record(&mut self, key: &str) {
        self.remove(key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(seq, key.to_string());
        self.by_key.insert(key.to_string(), seq);
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) {
        if let Some(seq) = self.by_key.remove(key) {
            self.by_seq.remove(&seq);
        }
    }

    // == Pop Oldest ==
    /// Removes and returns the key stored longest ago.
    pub fn pop_oldest(&mut self) -> Option<String> {
        let (_, key) = self.by_seq.pop_first()?;
        self.by_key.remove(&key);
        Some(key)
    }

    pub fn peek_oldest(&self) -> Option<&str> {
        self.by_seq.values().next().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.by_seq.clear();
        self.by_key.clear();
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
