//! PostgreSQL store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, Pool, Postgres, Transaction};

use super::{Store, EMAIL_TAKEN, INVALID_AUTHORS};
use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorRequest, AuthorRow, AuthorShort},
        book::{Book, BookRequest, BookRow, BookShort},
        loan::{Loan, LoanDetails, NewLoan},
        user::{User, UserData, UserShort},
    },
};

/// Partial unique index closing the check-then-insert race on loans
const ACTIVE_LOAN_INDEX: &str = "loans_one_active_per_book";
const USERS_EMAIL_INDEX: &str = "users_email_unique";

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

#[derive(FromRow)]
struct BookAuthorLink {
    book_id: i32,
    id: i32,
    name: String,
}

#[derive(FromRow)]
struct AuthorBookLink {
    author_id: i32,
    id: i32,
    title: String,
    publication_year: i32,
}

#[derive(FromRow)]
struct LoanDetailsRow {
    id: i32,
    user_id: i32,
    book_id: i32,
    loan_date: NaiveDate,
    due_date: NaiveDate,
    return_date: Option<NaiveDate>,
    user_name: String,
    user_email: String,
    book_title: Option<String>,
    book_publication_year: Option<i32>,
}

impl From<LoanDetailsRow> for LoanDetails {
    fn from(row: LoanDetailsRow) -> Self {
        let book = match (row.book_title, row.book_publication_year) {
            (Some(title), Some(publication_year)) => Some(BookShort {
                id: row.book_id,
                title,
                publication_year,
            }),
            _ => None,
        };

        LoanDetails {
            id: row.id,
            user_id: row.user_id,
            book_id: row.book_id,
            loan_date: row.loan_date,
            due_date: row.due_date,
            return_date: row.return_date,
            user: Some(UserShort {
                id: row.user_id,
                name: row.user_name,
                email: row.user_email,
            }),
            book,
        }
    }
}

fn is_unique_violation(e: &sqlx::Error, constraint: &str) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some("23505") && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create the connection pool
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to run database migrations: {}", e)))
    }

    async fn authors_for_books(&self, book_ids: &[i32]) -> AppResult<HashMap<i32, Vec<AuthorShort>>> {
        let links = sqlx::query_as::<_, BookAuthorLink>(
            r#"
            SELECT ab.book_id, a.id, a.name
            FROM author_book ab
            JOIN authors a ON a.id = ab.author_id
            WHERE a.deleted_at IS NULL AND ab.book_id = ANY($1)
            ORDER BY a.id
            "#,
        )
        .bind(book_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i32, Vec<AuthorShort>> = HashMap::new();
        for link in links {
            grouped.entry(link.book_id).or_default().push(AuthorShort {
                id: link.id,
                name: link.name,
            });
        }
        Ok(grouped)
    }

    async fn books_for_authors(&self, author_ids: &[i32]) -> AppResult<HashMap<i32, Vec<BookShort>>> {
        let links = sqlx::query_as::<_, AuthorBookLink>(
            r#"
            SELECT ab.author_id, b.id, b.title, b.publication_year
            FROM author_book ab
            JOIN books b ON b.id = ab.book_id
            WHERE b.deleted_at IS NULL AND ab.author_id = ANY($1)
            ORDER BY b.id
            "#,
        )
        .bind(author_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i32, Vec<BookShort>> = HashMap::new();
        for link in links {
            grouped.entry(link.author_id).or_default().push(BookShort {
                id: link.id,
                title: link.title,
                publication_year: link.publication_year,
            });
        }
        Ok(grouped)
    }

    async fn load_books(&self, rows: Vec<BookRow>) -> AppResult<Vec<Book>> {
        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        let mut authors = self.authors_for_books(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let book_authors = authors.remove(&row.id).unwrap_or_default();
                row.with_authors(book_authors)
            })
            .collect())
    }

    async fn load_authors(&self, rows: Vec<AuthorRow>) -> AppResult<Vec<Author>> {
        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        let mut books = self.books_for_authors(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let author_books = books.remove(&row.id).unwrap_or_default();
                row.with_books(author_books)
            })
            .collect())
    }

    async fn load_book(&self, row: BookRow) -> AppResult<Book> {
        let mut books = self.load_books(vec![row]).await?;
        books
            .pop()
            .ok_or_else(|| AppError::Internal("Book vanished while loading authors".to_string()))
    }

    async fn load_author(&self, row: AuthorRow) -> AppResult<Author> {
        let mut authors = self.load_authors(vec![row]).await?;
        authors
            .pop()
            .ok_or_else(|| AppError::Internal("Author vanished while loading books".to_string()))
    }

    /// Replace the author set of a book inside a transaction
    async fn sync_authors(
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
        author_ids: &[i32],
    ) -> AppResult<()> {
        let known: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM authors WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(author_ids)
        .fetch_one(&mut **tx)
        .await?;

        if known != author_ids.len() as i64 {
            return Err(AppError::Validation(INVALID_AUTHORS.to_string()));
        }

        sqlx::query("DELETE FROM author_book WHERE book_id = $1")
            .bind(book_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            "INSERT INTO author_book (author_id, book_id) SELECT UNNEST($1::int[]), $2",
        )
        .bind(author_ids)
        .bind(book_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn users_insert(&self, data: &UserData) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, USERS_EMAIL_INDEX) {
                AppError::Validation(EMAIL_TAKEN.to_string())
            } else {
                e.into()
            }
        })
    }

    async fn users_update(&self, id: i32, data: &UserData) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, email = $2, password = $3, updated_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, USERS_EMAIL_INDEX) {
                AppError::Validation(EMAIL_TAKEN.to_string())
            } else {
                e.into()
            }
        })
    }

    async fn users_get(&self, id: i32) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn users_get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn users_email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn users_list(&self) -> AppResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn users_delete(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn authors_insert(&self, data: &AuthorRequest) -> AppResult<Author> {
        let row = sqlx::query_as::<_, AuthorRow>(
            r#"
            INSERT INTO authors (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.with_books(Vec::new()))
    }

    async fn authors_update(&self, id: i32, data: &AuthorRequest) -> AppResult<Option<Author>> {
        let row = sqlx::query_as::<_, AuthorRow>(
            r#"
            UPDATE authors
            SET name = $1, updated_at = $2
            WHERE id = $3 AND deleted_at IS NULL
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_author(row).await?)),
            None => Ok(None),
        }
    }

    async fn authors_get(&self, id: i32) -> AppResult<Option<Author>> {
        let row = sqlx::query_as::<_, AuthorRow>(
            "SELECT id, name, created_at, updated_at FROM authors WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_author(row).await?)),
            None => Ok(None),
        }
    }

    async fn authors_list(&self) -> AppResult<Vec<Author>> {
        let rows = sqlx::query_as::<_, AuthorRow>(
            "SELECT id, name, created_at, updated_at FROM authors WHERE deleted_at IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        self.load_authors(rows).await
    }

    async fn authors_soft_delete(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE authors SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn books_insert(&self, data: &BookRequest) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, BookRow>(
            r#"
            INSERT INTO books (title, publication_year)
            VALUES ($1, $2)
            RETURNING id, title, publication_year, created_at, updated_at
            "#,
        )
        .bind(&data.title)
        .bind(data.publication_year)
        .fetch_one(&mut *tx)
        .await?;

        Self::sync_authors(&mut tx, row.id, &data.author_ids()).await?;
        tx.commit().await?;

        self.load_book(row).await
    }

    async fn books_update(&self, id: i32, data: &BookRequest) -> AppResult<Option<Book>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, BookRow>(
            r#"
            UPDATE books
            SET title = $1, publication_year = $2, updated_at = $3
            WHERE id = $4 AND deleted_at IS NULL
            RETURNING id, title, publication_year, created_at, updated_at
            "#,
        )
        .bind(&data.title)
        .bind(data.publication_year)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Self::sync_authors(&mut tx, row.id, &data.author_ids()).await?;
        tx.commit().await?;

        Ok(Some(self.load_book(row).await?))
    }

    async fn books_get(&self, id: i32) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT id, title, publication_year, created_at, updated_at
            FROM books
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_book(row).await?)),
            None => Ok(None),
        }
    }

    async fn books_list(&self) -> AppResult<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT id, title, publication_year, created_at, updated_at
            FROM books
            WHERE deleted_at IS NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.load_books(rows).await
    }

    async fn books_soft_delete(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE books SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn loans_insert(&self, data: &NewLoan) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, loan_date, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(data.book_id)
        .bind(data.loan_date)
        .bind(data.due_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, ACTIVE_LOAN_INDEX) {
                AppError::BookAlreadyLoaned {
                    book_id: data.book_id,
                }
            } else {
                e.into()
            }
        })
    }

    async fn loans_set_return_date(&self, id: i32, return_date: NaiveDate) -> AppResult<Option<Loan>> {
        Ok(sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET return_date = $1, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(return_date)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn loans_get(&self, id: i32) -> AppResult<Option<Loan>> {
        Ok(sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn loans_list_active(&self) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query_as::<_, LoanDetailsRow>(
            r#"
            SELECT l.id, l.user_id, l.book_id, l.loan_date, l.due_date, l.return_date,
                   u.name AS user_name, u.email AS user_email,
                   b.title AS book_title, b.publication_year AS book_publication_year
            FROM loans l
            JOIN users u ON u.id = l.user_id
            LEFT JOIN books b ON b.id = l.book_id AND b.deleted_at IS NULL
            WHERE l.return_date IS NULL
            ORDER BY l.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LoanDetails::from).collect())
    }

    async fn loans_delete(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn loans_book_has_active(&self, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE book_id = $1 AND return_date IS NULL)",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
