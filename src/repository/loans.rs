//! Loans repository

use std::sync::Arc;

use chrono::NaiveDate;

use super::{invalidating, CachePolicy};
use crate::{
    cache::{keys, Cache},
    error::{AppError, AppResult},
    models::loan::{Loan, LoanDetails, NewLoan},
    store::Store,
};

const INVALIDATES: &[&str] = &[keys::ALL_LOANS];

#[derive(Clone)]
pub struct LoansRepository {
    store: Arc<dyn Store>,
    cache: Cache,
    policy: CachePolicy,
}

impl LoansRepository {
    pub fn new(store: Arc<dyn Store>, cache: Cache, policy: CachePolicy) -> Self {
        Self { store, cache, policy }
    }

    /// Insert an active loan; fails with `BookAlreadyLoaned` if the book is out
    pub async fn persist(&self, data: &NewLoan) -> AppResult<Loan> {
        invalidating(&self.cache, INVALIDATES, self.store.loans_insert(data)).await
    }

    /// Record the return date
    pub async fn update(&self, id: i32, return_date: NaiveDate) -> AppResult<Loan> {
        invalidating(&self.cache, INVALIDATES, async {
            self.store
                .loans_set_return_date(id, return_date)
                .await?
                .ok_or_else(|| not_found(id))
        })
        .await
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Loan> {
        self.store.loans_get(id).await?.ok_or_else(|| not_found(id))
    }

    /// Active loans with borrower and book
    pub async fn find_all(&self) -> AppResult<Vec<LoanDetails>> {
        self.cache
            .remember(keys::ALL_LOANS, self.policy.ttl, || self.store.loans_list_active())
            .await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        invalidating(&self.cache, INVALIDATES, async {
            if self.store.loans_delete(id).await? {
                Ok(())
            } else {
                Err(not_found(id))
            }
        })
        .await
    }

    /// Whether the book has an active loan, answered from the warm listing
    /// when there is one
    pub async fn is_book_loaned(&self, book_id: i32) -> AppResult<bool> {
        if let Some(loans) = self.cache.get::<Vec<LoanDetails>>(keys::ALL_LOANS).await? {
            return Ok(loans
                .iter()
                .any(|loan| loan.book_id == book_id && loan.return_date.is_none()));
        }
        self.store.loans_book_has_active(book_id).await
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Loan with id {} not found", id))
}
