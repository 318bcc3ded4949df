//! Cache Module
//!
//! In-memory TTL stores, cache key derivation and cached producer calls.

mod cached;
mod entry;
pub mod keys;
mod order;
mod stats;
mod store;


use std::time::Duration;

// Re-export public types
pub use cached::{cached_call, Cacheable, SharedStore, SingleFlight};
pub use entry::CacheEntry;
pub use keys::{canonical_list, date_bucket_key, time_bucket_key};
pub use order::InsertionOrder;
pub use stats::CacheStats;
pub use store::CacheStore;

// == TTL Conversion ==
/// Converts a TTL given in minutes, the unit used at the configuration
/// boundary, into a Duration.
pub const fn ttl_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes * 60)
}
