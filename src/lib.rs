//! Ticker Relay - a caching and request-shaping relay for finance data
//!
//! Sits between UI clients and the rate-limited finance backend and Naver
//! search API. Responses are kept in per-domain TTL stores, and upstream
//! calls are coalesced, batched and rate limited.

pub mod api;
pub mod cache;
pub mod config;
pub mod connectors;
pub mod error;
pub mod models;
pub mod relay;
pub mod shaping;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use relay::Relay;
pub use tasks::spawn_sweep_task;
