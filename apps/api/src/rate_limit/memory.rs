use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::AppError;
use crate::rate_limit::{RateLimitStore, WindowState};

/// Process-local counters. Lost on restart; not shared between replicas.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, WindowState>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops windows that ended before `now_ms`.
    pub fn purge_expired(&self, now_ms: i64) {
        self.windows.retain(|_, w| w.window_end_ms > now_ms);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str, now_ms: i64, window_ms: i64) -> Result<WindowState, AppError> {
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.windows.entry(key.to_string()).or_insert(WindowState {
            count: 0,
            window_end_ms: now_ms,
        });
        if entry.count == 0 || now_ms >= entry.window_end_ms {
            *entry = WindowState {
                count: 1,
                window_end_ms: now_ms + window_ms,
            };
        } else {
            entry.count += 1;
        }
        Ok(*entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_hit_opens_window() {
        let store = InMemoryRateLimitStore::new();
        let state = store.hit("k", 100, 50).await.unwrap();
        assert_eq!(
            state,
            WindowState {
                count: 1,
                window_end_ms: 150
            }
        );
    }

    #[tokio::test]
    async fn test_hit_at_window_end_resets() {
        let store = InMemoryRateLimitStore::new();
        store.hit("k", 100, 50).await.unwrap();
        store.hit("k", 149, 50).await.unwrap();
        let state = store.hit("k", 150, 50).await.unwrap();
        assert_eq!(state.count, 1);
        assert_eq!(state.window_end_ms, 200);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryRateLimitStore::new();
        store.hit("old", 0, 10).await.unwrap();
        store.hit("new", 0, 1_000).await.unwrap();
        store.purge_expired(500);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_hits_are_all_counted() {
        let store = std::sync::Arc::new(InMemoryRateLimitStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.hit("shared", 0, 60_000).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let state = store.hit("shared", 0, 60_000).await.unwrap();
        assert_eq!(state.count, 51);
    }
}
