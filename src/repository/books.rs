//! Books repository

use std::sync::Arc;

use super::{invalidating, CachePolicy, Cached};
use crate::{
    cache::{keys, Cache},
    error::{AppError, AppResult},
    models::book::{Book, BookRequest},
    store::Store,
};

/// Authors list their books and loans embed the book
const INVALIDATES: &[&str] = &[keys::ALL_BOOKS, keys::ALL_AUTHORS, keys::ALL_LOANS];

#[derive(Clone)]
pub struct BooksRepository {
    store: Arc<dyn Store>,
    cache: Cache,
    policy: CachePolicy,
}

impl BooksRepository {
    pub fn new(store: Arc<dyn Store>, cache: Cache, policy: CachePolicy) -> Self {
        Self { store, cache, policy }
    }

    /// Create or update the book, attaching the authors listed in `data`
    pub async fn persist(&self, data: &BookRequest, id: Option<i32>) -> AppResult<Book> {
        invalidating(&self.cache, INVALIDATES, async {
            match id {
                None => self.store.books_insert(data).await,
                Some(id) => self
                    .store
                    .books_update(id, data)
                    .await?
                    .ok_or_else(|| not_found(id)),
            }
        })
        .await
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Book> {
        match self
            .policy
            .lookup(&self.cache, keys::ALL_BOOKS, |book: &Book| book.id == id)
            .await?
        {
            Cached::Hit(book) => Ok(book),
            Cached::Absent => Err(not_found(id)),
            Cached::Unknown => self.store.books_get(id).await?.ok_or_else(|| not_found(id)),
        }
    }

    /// Books with their authors
    pub async fn find_all(&self) -> AppResult<Vec<Book>> {
        self.cache
            .remember(keys::ALL_BOOKS, self.policy.ttl, || self.store.books_list())
            .await
    }

    /// Soft delete
    pub async fn delete(&self, book: &Book) -> AppResult<()> {
        invalidating(&self.cache, INVALIDATES, async {
            if self.store.books_soft_delete(book.id).await? {
                Ok(())
            } else {
                Err(not_found(book.id))
            }
        })
        .await
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}
