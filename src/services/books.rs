//! Books service

use crate::{
    error::AppResult,
    models::book::{Book, BookRequest},
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<Book>> {
        self.repository.books.find_all().await
    }

    pub async fn get(&self, id: i32) -> AppResult<Book> {
        self.repository.books.find_by_id(id).await
    }

    pub async fn create(&self, request: BookRequest) -> AppResult<Book> {
        let book = self.repository.books.persist(&request, None).await?;
        tracing::info!(book_id = book.id, authors = book.authors.len(), "Book created");
        Ok(book)
    }

    pub async fn update(&self, id: i32, request: BookRequest) -> AppResult<Book> {
        self.repository.books.persist(&request, Some(id)).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let book = self.repository.books.find_by_id(id).await?;
        self.repository.books.delete(&book).await
    }
}
