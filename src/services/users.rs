//! Users service

use crate::{
    error::{AppError, AppResult},
    models::user::{User, UserData, UserRequest},
    repository::Repository,
    store::EMAIL_TAKEN,
};

use super::auth::hash_password;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repository.users.find_all().await
    }

    pub async fn get(&self, id: i32) -> AppResult<User> {
        self.repository.users.find_by_id(id).await
    }

    /// Sign up a new user
    pub async fn create(&self, request: UserRequest) -> AppResult<User> {
        if self.repository.users.email_exists(&request.email, None).await? {
            return Err(AppError::Validation(EMAIL_TAKEN.to_string()));
        }

        let user = self.repository.users.persist(&to_data(request)?, None).await?;
        tracing::info!(user_id = user.id, "User created");
        Ok(user)
    }

    /// A missing id wins over a taken email; the store reports the latter
    pub async fn update(&self, id: i32, request: UserRequest) -> AppResult<User> {
        self.repository.users.persist(&to_data(request)?, Some(id)).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let user = self.repository.users.find_by_id(id).await?;
        self.repository.users.delete(&user).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }
}

fn to_data(request: UserRequest) -> AppResult<UserData> {
    Ok(UserData {
        password_hash: hash_password(&request.password)?,
        name: request.name,
        email: request.email,
    })
}
