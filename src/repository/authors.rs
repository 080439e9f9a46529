//! Authors repository

use std::sync::Arc;

use super::{invalidating, CachePolicy, Cached};
use crate::{
    cache::{keys, Cache},
    error::{AppError, AppResult},
    models::author::{Author, AuthorRequest},
    store::Store,
};

/// Books embed their authors, so author writes also drop `all_books`
const INVALIDATES: &[&str] = &[keys::ALL_AUTHORS, keys::ALL_BOOKS];

#[derive(Clone)]
pub struct AuthorsRepository {
    store: Arc<dyn Store>,
    cache: Cache,
    policy: CachePolicy,
}

impl AuthorsRepository {
    pub fn new(store: Arc<dyn Store>, cache: Cache, policy: CachePolicy) -> Self {
        Self { store, cache, policy }
    }

    pub async fn persist(&self, data: &AuthorRequest, id: Option<i32>) -> AppResult<Author> {
        invalidating(&self.cache, INVALIDATES, async {
            match id {
                None => self.store.authors_insert(data).await,
                Some(id) => self
                    .store
                    .authors_update(id, data)
                    .await?
                    .ok_or_else(|| not_found(id)),
            }
        })
        .await
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Author> {
        match self
            .policy
            .lookup(&self.cache, keys::ALL_AUTHORS, |author: &Author| author.id == id)
            .await?
        {
            Cached::Hit(author) => Ok(author),
            Cached::Absent => Err(not_found(id)),
            Cached::Unknown => self.store.authors_get(id).await?.ok_or_else(|| not_found(id)),
        }
    }

    /// Authors with their books
    pub async fn find_all(&self) -> AppResult<Vec<Author>> {
        self.cache
            .remember(keys::ALL_AUTHORS, self.policy.ttl, || self.store.authors_list())
            .await
    }

    /// Soft delete
    pub async fn delete(&self, author: &Author) -> AppResult<()> {
        invalidating(&self.cache, INVALIDATES, async {
            if self.store.authors_soft_delete(author.id).await? {
                Ok(())
            } else {
                Err(not_found(author.id))
            }
        })
        .await
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Author with id {} not found", id))
}
