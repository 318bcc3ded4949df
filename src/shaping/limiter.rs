//! Request Limiter
//!
//! Sliding-window admission control for upstream calls. Every admitted call
//! records its start instant; a call is admitted while fewer than
//! `max_requests` starts fall inside the trailing window.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Length of the rolling window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Shortest wait between admission attempts.
pub const MIN_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Calls admitted per window
    pub max_requests: usize,
    pub window: Duration,
    pub min_backoff: Duration,
}

impl LimiterConfig {
    /// Per-minute budget with the standard window and backoff.
    pub fn per_minute(max_requests: usize) -> Self {
        Self {
            max_requests,
            window: RATE_WINDOW,
            min_backoff: MIN_BACKOFF,
        }
    }
}

/// Snapshot of the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub requests_in_window: usize,
    pub max_requests: usize,
    pub remaining: usize,
}

// == Request Limiter ==
#[derive(Debug)]
pub struct RequestLimiter {
    config: LimiterConfig,
    /// Start instants of admitted calls, oldest first
    window: Mutex<VecDeque<Instant>>,
}

impl RequestLimiter {
    /// Creates a limiter. A budget of zero is raised to one call per window.
    pub fn new(mut config: LimiterConfig) -> Self {
        config.max_requests = config.max_requests.max(1);
        Self {
            config,
            window: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> LimiterConfig {
        self.config
    }

    // == Can Admit ==
    /// Prunes the window and reports whether another call fits.
    pub async fn can_admit(&self) -> bool {
        let mut window = self.window.lock().await;
        self.prune(&mut window, Instant::now());
        window.len() < self.config.max_requests
    }

    // == Limited Call ==
    /// Waits until the window has room, records the call and runs `producer`.
    ///
    /// Waiting is not an error: the call blocks for as long as the window
    /// stays full, sleeping until the oldest recorded call leaves it (at least
    /// `min_backoff` per attempt). The producer's result, success or failure,
    /// is returned unchanged.
    pub async fn limited_call<T, F, Fut>(&self, producer: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        while let Err(wait) = self.try_admit().await {
            info!(
                wait_secs = wait.as_secs_f64().ceil(),
                max = self.config.max_requests,
                "request limit reached, waiting"
            );
            sleep(wait).await;
        }

        let result = producer().await;
        let requests_in_window = self.stats().await.requests_in_window;
        debug!(requests_in_window, "limited call completed");
        result
    }

    /// Admits and records a call, or returns how long to wait.
    async fn try_admit(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut window = self.window.lock().await;
        self.prune(&mut window, now);

        if window.len() < self.config.max_requests {
            window.push_back(now);
            return Ok(());
        }

        let until_free = window
            .front()
            .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
            .unwrap_or_default();
        Err(until_free.max(self.config.min_backoff))
    }

    // == Stats ==
    pub async fn stats(&self) -> LimiterStats {
        let mut window = self.window.lock().await;
        self.prune(&mut window, Instant::now());
        LimiterStats {
            requests_in_window: window.len(),
            max_requests: self.config.max_requests,
            remaining: self.config.max_requests.saturating_sub(window.len()),
        }
    }

    fn prune(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = window.front() {
            if now.saturating_duration_since(*oldest) < self.config.window {
                break;
            }
            window.pop_front();
        }
    }
}
