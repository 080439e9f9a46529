//! In-process store with the same rules as the PostgreSQL schema

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::{Store, EMAIL_TAKEN, INVALID_AUTHORS};
use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorRequest, AuthorRow, AuthorShort},
        book::{Book, BookRequest, BookRow, BookShort},
        loan::{Loan, LoanDetails, NewLoan},
        user::{User, UserData, UserShort},
    },
};

struct SoftDeleted<T> {
    row: T,
    deleted_at: Option<DateTime<Utc>>,
}

impl<T> SoftDeleted<T> {
    fn live(&self) -> Option<&T> {
        match self.deleted_at {
            None => Some(&self.row),
            Some(_) => None,
        }
    }
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    authors: BTreeMap<i32, SoftDeleted<AuthorRow>>,
    books: BTreeMap<i32, SoftDeleted<BookRow>>,
    /// (author_id, book_id)
    author_book: BTreeSet<(i32, i32)>,
    loans: BTreeMap<i32, Loan>,
    last_id: i32,
}

impl Tables {
    /// One sequence for every table; ids only need to be unique per table
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> bool {
        self.users
            .values()
            .any(|user| user.email == email && Some(user.id) != exclude_id)
    }

    fn live_author(&self, id: i32) -> Option<&AuthorRow> {
        self.authors.get(&id).and_then(SoftDeleted::live)
    }

    fn live_book(&self, id: i32) -> Option<&BookRow> {
        self.books.get(&id).and_then(SoftDeleted::live)
    }

    fn check_authors(&self, author_ids: &[i32]) -> AppResult<()> {
        if author_ids.iter().all(|id| self.live_author(*id).is_some()) {
            Ok(())
        } else {
            Err(AppError::Validation(INVALID_AUTHORS.to_string()))
        }
    }

    fn sync_authors(&mut self, book_id: i32, author_ids: &[i32]) {
        self.author_book.retain(|(_, book)| *book != book_id);
        for author_id in author_ids {
            self.author_book.insert((*author_id, book_id));
        }
    }

    fn book(&self, row: &BookRow) -> Book {
        let authors = self
            .author_book
            .iter()
            .filter(|(_, book_id)| *book_id == row.id)
            .filter_map(|(author_id, _)| self.live_author(*author_id))
            .map(|author| AuthorShort {
                id: author.id,
                name: author.name.clone(),
            })
            .collect();
        row.clone().with_authors(authors)
    }

    fn author(&self, row: &AuthorRow) -> Author {
        let mut books: Vec<BookShort> = self
            .author_book
            .iter()
            .filter(|(author_id, _)| *author_id == row.id)
            .filter_map(|(_, book_id)| self.live_book(*book_id))
            .map(|book| BookShort {
                id: book.id,
                title: book.title.clone(),
                publication_year: book.publication_year,
            })
            .collect();
        books.sort_by_key(|book| book.id);
        row.clone().with_books(books)
    }
}

/// Store kept entirely in memory, for tests and local runs
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a book row exists with a deletion marker
    pub async fn is_book_soft_deleted(&self, id: i32) -> bool {
        self.tables
            .read()
            .await
            .books
            .get(&id)
            .is_some_and(|book| book.deleted_at.is_some())
    }

    /// Whether an author row exists with a deletion marker
    pub async fn is_author_soft_deleted(&self, id: i32) -> bool {
        self.tables
            .read()
            .await
            .authors
            .get(&id)
            .is_some_and(|author| author.deleted_at.is_some())
    }

    /// Number of loan rows, returned or not
    pub async fn loans_count(&self) -> usize {
        self.tables.read().await.loans.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn users_insert(&self, data: &UserData) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&data.email, None) {
            return Err(AppError::Validation(EMAIL_TAKEN.to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: tables.next_id(),
            name: data.name.clone(),
            email: data.email.clone(),
            password: data.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn users_update(&self, id: i32, data: &UserData) -> AppResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        if tables.email_taken(&data.email, Some(id)) {
            return Err(AppError::Validation(EMAIL_TAKEN.to_string()));
        }

        Ok(tables.users.get_mut(&id).map(|user| {
            user.name = data.name.clone();
            user.email = data.email.clone();
            user.password = data.password_hash.clone();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn users_get(&self, id: i32) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn users_get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn users_email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        Ok(self.tables.read().await.email_taken(email, exclude_id))
    }

    async fn users_list(&self) -> AppResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn users_delete(&self, id: i32) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.users.remove(&id).is_some();
        if removed {
            tables.loans.retain(|_, loan| loan.user_id != id);
        }
        Ok(removed)
    }

    async fn authors_insert(&self, data: &AuthorRequest) -> AppResult<Author> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = AuthorRow {
            id: tables.next_id(),
            name: data.name.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.authors.insert(
            row.id,
            SoftDeleted {
                row: row.clone(),
                deleted_at: None,
            },
        );
        Ok(row.with_books(Vec::new()))
    }

    async fn authors_update(&self, id: i32, data: &AuthorRequest) -> AppResult<Option<Author>> {
        let mut tables = self.tables.write().await;
        let row = match tables.authors.get_mut(&id) {
            Some(author) if author.deleted_at.is_none() => {
                author.row.name = data.name.clone();
                author.row.updated_at = Utc::now();
                author.row.clone()
            }
            _ => return Ok(None),
        };
        Ok(Some(tables.author(&row)))
    }

    async fn authors_get(&self, id: i32) -> AppResult<Option<Author>> {
        let tables = self.tables.read().await;
        Ok(tables.live_author(id).map(|row| tables.author(row)))
    }

    async fn authors_list(&self) -> AppResult<Vec<Author>> {
        let tables = self.tables.read().await;
        Ok(tables
            .authors
            .values()
            .filter_map(SoftDeleted::live)
            .map(|row| tables.author(row))
            .collect())
    }

    async fn authors_soft_delete(&self, id: i32) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.authors.get_mut(&id) {
            Some(author) if author.deleted_at.is_none() => {
                author.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn books_insert(&self, data: &BookRequest) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        let author_ids = data.author_ids();
        tables.check_authors(&author_ids)?;

        let now = Utc::now();
        let row = BookRow {
            id: tables.next_id(),
            title: data.title.clone(),
            publication_year: data.publication_year,
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(
            row.id,
            SoftDeleted {
                row: row.clone(),
                deleted_at: None,
            },
        );
        tables.sync_authors(row.id, &author_ids);
        Ok(tables.book(&row))
    }

    async fn books_update(&self, id: i32, data: &BookRequest) -> AppResult<Option<Book>> {
        let mut tables = self.tables.write().await;
        if tables.live_book(id).is_none() {
            return Ok(None);
        }
        let author_ids = data.author_ids();
        tables.check_authors(&author_ids)?;

        let row = match tables.books.get_mut(&id) {
            Some(book) => {
                book.row.title = data.title.clone();
                book.row.publication_year = data.publication_year;
                book.row.updated_at = Utc::now();
                book.row.clone()
            }
            None => return Ok(None),
        };
        tables.sync_authors(id, &author_ids);
        Ok(Some(tables.book(&row)))
    }

    async fn books_get(&self, id: i32) -> AppResult<Option<Book>> {
        let tables = self.tables.read().await;
        Ok(tables.live_book(id).map(|row| tables.book(row)))
    }

    async fn books_list(&self) -> AppResult<Vec<Book>> {
        let tables = self.tables.read().await;
        Ok(tables
            .books
            .values()
            .filter_map(SoftDeleted::live)
            .map(|row| tables.book(row))
            .collect())
    }

    async fn books_soft_delete(&self, id: i32) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.books.get_mut(&id) {
            Some(book) if book.deleted_at.is_none() => {
                book.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn loans_insert(&self, data: &NewLoan) -> AppResult<Loan> {
        let mut tables = self.tables.write().await;

        // Same guarantee as the partial unique index; the write lock makes
        // check and insert atomic
        if tables
            .loans
            .values()
            .any(|loan| loan.book_id == data.book_id && loan.is_active())
        {
            return Err(AppError::BookAlreadyLoaned {
                book_id: data.book_id,
            });
        }
        if !tables.users.contains_key(&data.user_id) {
            return Err(AppError::NotFound(format!("User with id {} not found", data.user_id)));
        }
        if !tables.books.contains_key(&data.book_id) {
            return Err(AppError::NotFound(format!("Book with id {} not found", data.book_id)));
        }

        let now = Utc::now();
        let loan = Loan {
            id: tables.next_id(),
            user_id: data.user_id,
            book_id: data.book_id,
            loan_date: data.loan_date,
            due_date: data.due_date,
            return_date: None,
            created_at: now,
            updated_at: now,
        };
        tables.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn loans_set_return_date(&self, id: i32, return_date: NaiveDate) -> AppResult<Option<Loan>> {
        let mut tables = self.tables.write().await;
        Ok(tables.loans.get_mut(&id).map(|loan| {
            loan.return_date = Some(return_date);
            loan.updated_at = Utc::now();
            loan.clone()
        }))
    }

    async fn loans_get(&self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.tables.read().await.loans.get(&id).cloned())
    }

    async fn loans_list_active(&self) -> AppResult<Vec<LoanDetails>> {
        let tables = self.tables.read().await;
        Ok(tables
            .loans
            .values()
            .filter(|loan| loan.is_active())
            .map(|loan| {
                let user = tables.users.get(&loan.user_id).map(UserShort::from);
                let book = tables.live_book(loan.book_id).map(|book| BookShort {
                    id: book.id,
                    title: book.title.clone(),
                    publication_year: book.publication_year,
                });
                LoanDetails::new(loan, user, book)
            })
            .collect())
    }

    async fn loans_delete(&self, id: i32) -> AppResult<bool> {
        Ok(self.tables.write().await.loans.remove(&id).is_some())
    }

    async fn loans_book_has_active(&self, book_id: i32) -> AppResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .loans
            .values()
            .any(|loan| loan.book_id == book_id && loan.is_active()))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
