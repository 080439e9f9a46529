//! Relational store
//!
//! [`Store`] is the persistence seam under the repositories. [`PgStore`] talks
//! to PostgreSQL; [`MemoryStore`] keeps the same tables in process and follows
//! the same rules (soft deletes, author/book pivot, at most one active loan
//! per book).
//!
//! Soft-deleted authors and books are invisible to every method here,
//! including the relations loaded alongside other entities.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::{
        author::{Author, AuthorRequest},
        book::{Book, BookRequest},
        loan::{Loan, LoanDetails, NewLoan},
        user::{User, UserData},
    },
};

pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;

pub(crate) const INVALID_AUTHORS: &str = "The selected authors are invalid";
pub(crate) const EMAIL_TAKEN: &str = "The email has already been taken";

#[async_trait]
pub trait Store: Send + Sync {
    // Users (hard delete; deleting a user removes their loans)

    /// Fails with `Validation` when the email is taken
    async fn users_insert(&self, data: &UserData) -> AppResult<User>;
    async fn users_update(&self, id: i32, data: &UserData) -> AppResult<Option<User>>;
    async fn users_get(&self, id: i32) -> AppResult<Option<User>>;
    async fn users_get_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn users_email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool>;
    async fn users_list(&self) -> AppResult<Vec<User>>;
    async fn users_delete(&self, id: i32) -> AppResult<bool>;

    // Authors (soft delete)

    async fn authors_insert(&self, data: &AuthorRequest) -> AppResult<Author>;
    async fn authors_update(&self, id: i32, data: &AuthorRequest) -> AppResult<Option<Author>>;
    async fn authors_get(&self, id: i32) -> AppResult<Option<Author>>;
    async fn authors_list(&self) -> AppResult<Vec<Author>>;
    async fn authors_soft_delete(&self, id: i32) -> AppResult<bool>;

    // Books (soft delete)

    /// Inserts the book and attaches its authors; unknown authors fail with
    /// `Validation` and nothing is written
    async fn books_insert(&self, data: &BookRequest) -> AppResult<Book>;
    /// Updates the book and replaces its author set
    async fn books_update(&self, id: i32, data: &BookRequest) -> AppResult<Option<Book>>;
    async fn books_get(&self, id: i32) -> AppResult<Option<Book>>;
    async fn books_list(&self) -> AppResult<Vec<Book>>;
    async fn books_soft_delete(&self, id: i32) -> AppResult<bool>;

    // Loans (hard delete)

    /// Fails with `BookAlreadyLoaned` when the book has an active loan
    async fn loans_insert(&self, data: &NewLoan) -> AppResult<Loan>;
    async fn loans_set_return_date(&self, id: i32, return_date: NaiveDate) -> AppResult<Option<Loan>>;
    async fn loans_get(&self, id: i32) -> AppResult<Option<Loan>>;
    /// Active loans with their borrower and book
    async fn loans_list_active(&self) -> AppResult<Vec<LoanDetails>>;
    async fn loans_delete(&self, id: i32) -> AppResult<bool>;
    async fn loans_book_has_active(&self, book_id: i32) -> AppResult<bool>;

    async fn ping(&self) -> AppResult<()>;
}
