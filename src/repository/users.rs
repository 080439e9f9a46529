//! Users repository

use std::sync::Arc;

use super::{invalidating, CachePolicy, Cached};
use crate::{
    cache::{keys, Cache},
    error::{AppError, AppResult},
    models::user::{User, UserData},
    store::Store,
};

/// Loan listings embed the borrower, so user writes also drop `all_loans`
const INVALIDATES: &[&str] = &[keys::ALL_USERS, keys::ALL_LOANS];

#[derive(Clone)]
pub struct UsersRepository {
    store: Arc<dyn Store>,
    cache: Cache,
    policy: CachePolicy,
}

impl UsersRepository {
    pub fn new(store: Arc<dyn Store>, cache: Cache, policy: CachePolicy) -> Self {
        Self { store, cache, policy }
    }

    /// Create the user, or update it when `id` is given
    pub async fn persist(&self, data: &UserData, id: Option<i32>) -> AppResult<User> {
        invalidating(&self.cache, INVALIDATES, async {
            match id {
                None => self.store.users_insert(data).await,
                Some(id) => self
                    .store
                    .users_update(id, data)
                    .await?
                    .ok_or_else(|| not_found(id)),
            }
        })
        .await
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<User> {
        match self
            .policy
            .lookup(&self.cache, keys::ALL_USERS, |user: &User| user.id == id)
            .await?
        {
            Cached::Hit(user) => Ok(user),
            Cached::Absent => Err(not_found(id)),
            Cached::Unknown => self.store.users_get(id).await?.ok_or_else(|| not_found(id)),
        }
    }

    /// Always read from the store: cached users carry no password hash
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.store.users_get_by_email(email).await
    }

    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        self.store.users_email_exists(email, exclude_id).await
    }

    pub async fn find_all(&self) -> AppResult<Vec<User>> {
        self.cache
            .remember(keys::ALL_USERS, self.policy.ttl, || self.store.users_list())
            .await
    }

    /// Hard delete; the user's loans go with it
    pub async fn delete(&self, user: &User) -> AppResult<()> {
        invalidating(&self.cache, INVALIDATES, async {
            if self.store.users_delete(user.id).await? {
                Ok(())
            } else {
                Err(not_found(user.id))
            }
        })
        .await
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("User with id {} not found", id))
}
