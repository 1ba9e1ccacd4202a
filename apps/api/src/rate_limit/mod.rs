//! Fixed-window rate limiting keyed by `(identifier, endpoint)`.
//!
//! Bursts straddling a window boundary can reach twice the limit; that is the
//! known cost of a fixed window.
//!
//! `RateLimiter` holds an `Arc<dyn RateLimitStore>` (in-memory or Redis, picked
//! from `REDIS_URL` at startup) and an `Arc<dyn Clock>`.

pub mod memory;
pub mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::AppError;

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Counter state after recording one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub count: u32,
    pub window_end_ms: i64,
}

/// Storage for per-key window counters. `hit` must be atomic per key: start a
/// new window (`count = 1`) when none exists or `now_ms >= window_end_ms`,
/// otherwise increment.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(&self, key: &str, now_ms: i64, window_ms: i64) -> Result<WindowState, AppError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitOutcome {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Charges one request against the window, then decides.
    /// The request that brings the count to exactly `max_requests` is allowed.
    pub async fn check(
        &self,
        identifier: &str,
        endpoint: &str,
        window_ms: i64,
        max_requests: u32,
    ) -> Result<RateLimitOutcome, AppError> {
        let now = self.clock.now_ms();
        let key = format!("{endpoint}:{identifier}");
        let state = self.store.hit(&key, now, window_ms).await?;

        let allowed = state.count <= max_requests;
        let retry_after_seconds = if allowed {
            None
        } else {
            let wait_ms = (state.window_end_ms - now).max(0) as u64;
            Some(wait_ms.div_ceil(1000))
        };

        Ok(RateLimitOutcome {
            allowed,
            remaining: max_requests.saturating_sub(state.count),
            reset_at: DateTime::<Utc>::from_timestamp_millis(state.window_end_ms)
                .unwrap_or_else(Utc::now),
            retry_after_seconds,
        })
    }

    /// `check`, turned into `AppError::RateLimited` on denial.
    pub async fn enforce(
        &self,
        identifier: &str,
        endpoint: &str,
        window_ms: i64,
        max_requests: u32,
    ) -> Result<RateLimitOutcome, AppError> {
        let outcome = self.check(identifier, endpoint, window_ms, max_requests).await?;
        if !outcome.allowed {
            tracing::warn!(endpoint, identifier, "Rate limit exceeded");
            return Err(AppError::RateLimited {
                retry_after_seconds: outcome.retry_after_seconds.unwrap_or(1),
            });
        }
        Ok(outcome)
    }
}
