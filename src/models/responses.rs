//! Response DTOs for the relay API
//!
//! Defines the structure of outgoing HTTP response bodies. Relayed data is
//! returned exactly as the upstream sent it, so only the administrative
//! endpoints have dedicated types here.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::CacheStats;
use crate::relay::RelayStats;
use crate::shaping::LimiterStats;

/// Response body for `POST /cache/invalidate`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub store: String,
    pub pattern: String,
    /// Number of keys removed
    pub removed: usize,
}

impl InvalidateResponse {
    pub fn new(store: impl Into<String>, pattern: impl Into<String>, removed: usize) -> Self {
        Self {
            store: store.into(),
            pattern: pattern.into(),
            removed,
        }
    }
}

/// Response body for `DELETE /cache`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new() -> Self {
        Self {
            message: "All caches cleared".to_string(),
        }
    }
}

impl Default for ClearResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Response body for `DELETE /api/news/debounce/:key`
#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub key: String,
    /// Whether a debounced call was pending
    pub cancelled: bool,
}

/// Statistics of one store
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub expirations: u64,
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<&CacheStats> for StoreStatsResponse {
    fn from(stats: &CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            invalidations: stats.invalidations,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub stores: BTreeMap<&'static str, StoreStatsResponse>,
    pub limiter: LimiterStats,
    pub in_flight: usize,
    pub pending_debounce: usize,
}

impl From<RelayStats> for StatsResponse {
    fn from(stats: RelayStats) -> Self {
        Self {
            stores: stats
                .stores
                .iter()
                .map(|(name, store)| (*name, StoreStatsResponse::from(store)))
                .collect(),
            limiter: stats.limiter,
            in_flight: stats.in_flight,
            pending_debounce: stats.pending_debounce,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
