//! Request Shaping Module
//!
//! Controls how calls reach the upstream APIs: a sliding-window limiter,
//! a keyed debouncer and a request batcher.

mod batch;
mod debounce;
mod limiter;

pub use batch::{BatchConfig, BatchManager};
pub use debounce::Debouncer;
pub use limiter::{LimiterConfig, LimiterStats, RequestLimiter, MIN_BACKOFF, RATE_WINDOW};
