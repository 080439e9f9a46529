//! Business logic services

pub mod auth;
pub mod authors;
pub mod books;
pub mod loans;
pub mod notifications;
pub mod users;

use std::sync::Arc;

use crate::{config::AuthConfig, repository::Repository};

use self::notifications::{NotificationDispatcher, Notifier};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub authors: authors::AuthorsService,
    pub books: books::BooksService,
    pub loans: loans::LoansService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config),
            users: users::UsersService::new(repository.clone()),
            authors: authors::AuthorsService::new(repository.clone()),
            books: books::BooksService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone(), NotificationDispatcher::new(notifier)),
            repository,
        }
    }
}
