//! Authors service

use crate::{
    error::AppResult,
    models::author::{Author, AuthorRequest},
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthorsService {
    repository: Repository,
}

impl AuthorsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<Author>> {
        self.repository.authors.find_all().await
    }

    pub async fn get(&self, id: i32) -> AppResult<Author> {
        self.repository.authors.find_by_id(id).await
    }

    pub async fn create(&self, request: AuthorRequest) -> AppResult<Author> {
        self.repository.authors.persist(&request, None).await
    }

    pub async fn update(&self, id: i32, request: AuthorRequest) -> AppResult<Author> {
        self.repository.authors.persist(&request, Some(id)).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let author = self.repository.authors.find_by_id(id).await?;
        self.repository.authors.delete(&author).await
    }
}
