//! Cache-aside store
//!
//! Repositories keep their full-collection loads in a key/value cache with a
//! TTL. [`Cache`] is the handle they are given: it serializes values as JSON
//! and delegates storage to a [`CacheBackend`] (Redis in production, an
//! in-process map for tests and local runs).
//!
//! There is no lock around [`Cache::remember`]: two cold requests may both run
//! the loader and both write the key, which is harmless since they write the
//! same committed state.

pub mod memory;
pub mod redis;

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult};

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// List keys, one per entity type
pub mod keys {
    pub const ALL_USERS: &str = "all_users";
    pub const ALL_AUTHORS: &str = "all_authors";
    pub const ALL_BOOKS: &str = "all_books";
    pub const ALL_LOANS: &str = "all_loans";
}

/// Raw key/value storage with expiry
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Stored payload, `None` if absent or expired
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AppResult<()>;

    /// Remove a key; absent keys are not an error
    async fn forget(&self, key: &str) -> AppResult<()>;

    async fn has(&self, key: &str) -> AppResult<bool>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> AppResult<()>;
}

/// Typed cache handle shared by the repositories
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Cache backed by an in-process map
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    /// Get a value; undecodable payloads count as a miss
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> AppResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Failed to serialize cache value: {}", e)))?;
        self.backend.set(key, raw, ttl).await
    }

    /// Return the cached value, or run `loader`, store its result and return it.
    ///
    /// A failing loader leaves the key untouched and its error is returned.
    pub async fn remember<T, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        if let Some(value) = self.get(key).await? {
            tracing::debug!(key, "Cache hit");
            return Ok(value);
        }

        tracing::debug!(key, "Cache miss");
        let value = loader().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }

    pub async fn forget(&self, key: &str) -> AppResult<()> {
        tracing::debug!(key, "Cache invalidated");
        self.backend.forget(key).await
    }

    pub async fn has(&self, key: &str) -> AppResult<bool> {
        self.backend.has(key).await
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.backend.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_remember_loads_once() {
        let cache = Cache::memory();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<i32> = cache
                .remember("numbers", TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.has("numbers").await.unwrap());
    }

    #[tokio::test]
    async fn test_remember_loader_failure_writes_nothing() {
        let cache = Cache::memory();

        let result: AppResult<Vec<i32>> = cache
            .remember("numbers", TTL, || async {
                Err(AppError::Internal("store unavailable".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(!cache.has("numbers").await.unwrap());
    }

    #[tokio::test]
    async fn test_forget_is_idempotent() {
        let cache = Cache::memory();
        cache.set("key", &1, TTL).await.unwrap();

        cache.forget("key").await.unwrap();
        cache.forget("key").await.unwrap();
        cache.forget("never-set").await.unwrap();

        assert!(!cache.has("key").await.unwrap());
        assert_eq!(cache.get::<i32>("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let cache = Cache::memory();
        cache.set("key", &"not a number", TTL).await.unwrap();

        assert_eq!(cache.get::<i32>("key").await.unwrap(), None);

        let value: i32 = cache.remember("key", TTL, || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(cache.get::<i32>("key").await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_expired_entry_reloads() {
        let cache = Cache::memory();
        let short = Duration::from_millis(20);

        let first: i32 = cache.remember("key", short, || async { Ok(1) }).await.unwrap();
        assert_eq!(first, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!cache.has("key").await.unwrap());
        let second: i32 = cache.remember("key", short, || async { Ok(2) }).await.unwrap();
        assert_eq!(second, 2);
    }
}
