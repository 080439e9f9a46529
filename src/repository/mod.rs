//! Repository layer: cache-aside access to the store

pub mod authors;
pub mod books;
pub mod loans;
pub mod users;

use std::{future::Future, sync::Arc, time::Duration};

use serde::de::DeserializeOwned;

use crate::{
    cache::Cache,
    config::{CacheConfig, LookupPolicy},
    error::AppResult,
    store::Store,
};

/// How repositories use the cache
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub lookup: LookupPolicy,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            lookup: LookupPolicy::FallbackToStore,
        }
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_seconds),
            lookup: config.lookup_policy,
        }
    }
}

/// Outcome of looking an id up in a cached collection
pub(crate) enum Cached<T> {
    Hit(T),
    /// Warm snapshot without the id, and the policy trusts the snapshot
    Absent,
    /// Cold key, or a warm miss that must be confirmed by the store
    Unknown,
}

impl CachePolicy {
    pub(crate) async fn lookup<T, F>(&self, cache: &Cache, key: &str, matches: F) -> AppResult<Cached<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let Some(entities) = cache.get::<Vec<T>>(key).await? else {
            return Ok(Cached::Unknown);
        };

        if let Some(entity) = entities.into_iter().find(|entity| matches(entity)) {
            return Ok(Cached::Hit(entity));
        }

        match self.lookup {
            LookupPolicy::CacheOnly => {
                tracing::info!(key, "Entity absent from cached snapshot");
                Ok(Cached::Absent)
            }
            LookupPolicy::FallbackToStore => Ok(Cached::Unknown),
        }
    }
}

/// Drop every listed key
async fn forget_all(cache: &Cache, keys: &[&str]) -> AppResult<()> {
    for key in keys {
        cache.forget(key).await?;
    }
    Ok(())
}

/// Run a store write with `keys` dropped before it and again once it succeeds.
///
/// A listing read between the first drop and the commit may re-cache the old
/// rows; the second drop discards it. A failed write keeps only the first.
pub(crate) async fn invalidating<T, Fut>(cache: &Cache, keys: &[&str], write: Fut) -> AppResult<T>
where
    Fut: Future<Output = AppResult<T>>,
{
    forget_all(cache, keys).await?;
    let written = write.await?;
    forget_all(cache, keys).await?;
    Ok(written)
}

/// Main repository struct holding one repository per entity type
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
    cache: Cache,
    pub users: users::UsersRepository,
    pub authors: authors::AuthorsRepository,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>, cache: Cache, policy: CachePolicy) -> Self {
        Self {
            users: users::UsersRepository::new(store.clone(), cache.clone(), policy),
            authors: authors::AuthorsRepository::new(store.clone(), cache.clone(), policy),
            books: books::BooksRepository::new(store.clone(), cache.clone(), policy),
            loans: loans::LoansRepository::new(store.clone(), cache.clone(), policy),
            store,
            cache,
        }
    }

    /// Check that both the store and the cache answer
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await?;
        self.cache.ping().await
    }
}
