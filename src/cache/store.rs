//! Cache Store Module
//!
//! Bounded key/value store with per-entry TTL, oldest-stored eviction and
//! pattern invalidation. None of the store operations fail: absence, expiry
//! and capacity pressure are all handled by policy.

use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, InsertionOrder};
use crate::config::StoreConfig;

// == Cache Store ==
/// A named TTL store holding values of one logical data domain.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Domain name, used in logs and stats
    name: String,
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Storage order for eviction
    order: InsertionOrder,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// TTL applied when `set` is given none
    default_ttl: Duration,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new store.
    ///
    /// A capacity of zero is raised to one so that the most recent value can
    /// always be held.
    pub fn new(name: impl Into<String>, max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    /// Creates a store from its minute-based configuration.
    pub fn from_config(name: impl Into<String>, config: StoreConfig) -> Self {
        Self::new(name, config.max_entries, config.default_ttl())
    }

    // == Get ==
    /// Returns the value stored under `key` if it has not expired.
    ///
    /// An expired entry is removed on the spot and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            debug!(store = %self.name, key, "expired entry dropped on read");
            return None;
        }

        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any existing entry.
    ///
    /// `ttl` of `None` or zero falls back to the store's default. When a new
    /// key arrives at capacity, the single entry stored longest ago is evicted
    /// first.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let ttl = match ttl {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => self.default_ttl,
        };

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            if let Some(evicted) = self.order.pop_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
                debug!(store = %self.name, key = %evicted, "evicted oldest entry");
            }
        }

        self.entries.insert(key.clone(), CacheEntry::new(value, ttl));
        self.order.record(&key);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Remove ==
    /// Removes one key. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    // == Invalidate Pattern ==
    /// Removes every entry whose key matches `pattern`.
    ///
    /// `pattern` is regular-expression source matched anywhere in the key, so
    /// a plain word behaves as a substring test. Text that is not a valid
    /// expression is matched literally. Returns the number of entries removed.
    pub fn invalidate_pattern(&mut self, pattern: &str) -> usize {
        let regex = Regex::new(pattern).ok();
        let is_match = |key: &str| match &regex {
            Some(regex) => regex.is_match(key),
            None => key.contains(pattern),
        };

        let matching: Vec<String> = self
            .entries
            .keys()
            .filter(|key| is_match(key.as_str()))
            .cloned()
            .collect();

        for key in &matching {
            self.remove_entry(key);
        }

        self.stats.record_invalidations(matching.len());
        if !matching.is_empty() {
            debug!(store = %self.name, pattern, removed = matching.len(), "invalidated entries");
        }
        matching.len()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stats.set_total_entries(0);
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }

        self.stats.record_expirations(expired.len());
        expired.len()
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Key stored longest ago, i.e. the next eviction candidate.
    pub fn oldest_key(&self) -> Option<&str> {
        self.order.peek_oldest()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.order.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }
}
