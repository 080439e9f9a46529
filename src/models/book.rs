//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::author::AuthorShort;

/// Book row as stored
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    pub id: i32,
    pub title: String,
    pub publication_year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookRow {
    pub fn with_authors(self, authors: Vec<AuthorShort>) -> Book {
        Book {
            id: self.id,
            title: self.title,
            publication_year: self.publication_year,
            created_at: self.created_at,
            updated_at: self.updated_at,
            authors,
        }
    }
}

/// Book with its authors eagerly loaded
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub publication_year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub authors: Vec<AuthorShort>,
}

/// Book as embedded in an author or a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub publication_year: i32,
}

impl From<&Book> for BookShort {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            publication_year: book.publication_year,
        }
    }
}

/// Reference to an author in a book payload
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct BookAuthorRef {
    pub author_id: i32,
}

/// Create or update book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookRequest {
    #[validate(length(min = 1, max = 255, message = "The title field is required"))]
    pub title: String,
    #[validate(range(min = 0, max = 9999, message = "The publication year is invalid"))]
    pub publication_year: i32,
    #[serde(default)]
    pub authors: Vec<BookAuthorRef>,
}

impl BookRequest {
    /// Author ids in payload order, duplicates removed
    pub fn author_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = Vec::with_capacity(self.authors.len());
        for author in &self.authors {
            if !ids.contains(&author.author_id) {
                ids.push(author.author_id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_ids_dedup() {
        let request: BookRequest = serde_json::from_value(serde_json::json!({
            "title": "The Book",
            "publication_year": 2020,
            "authors": [{"author_id": 2}, {"author_id": 1}, {"author_id": 2}]
        }))
        .unwrap();
        assert_eq!(request.author_ids(), vec![2, 1]);
    }

    #[test]
    fn test_authors_default_empty() {
        let request: BookRequest = serde_json::from_value(serde_json::json!({
            "title": "The Book",
            "publication_year": 2020
        }))
        .unwrap();
        assert!(request.authors.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_invalid_year() {
        let request = BookRequest {
            title: "The Book".to_string(),
            publication_year: -4,
            authors: Vec::new(),
        };
        assert!(request.validate().is_err());
    }
}
