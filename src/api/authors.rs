//! Author endpoints

use axum::extract::{Path, State};

use crate::{
    error::AppResult,
    models::author::{Author, AuthorRequest},
    AppState,
};

use super::{ApiResponse, AuthenticatedUser, ValidatedJson};

/// List authors with their books
#[utoipa::path(
    get,
    path = "/api/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All authors", body = Vec<Author>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_authors(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<ApiResponse<Vec<Author>>> {
    let authors = state.services.authors.list().await?;
    Ok(ApiResponse::ok("Authors retrieved successfully", authors))
}

#[utoipa::path(
    get,
    path = "/api/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Author details", body = Author),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_author(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<Author>> {
    let author = state.services.authors.get(id).await?;
    Ok(ApiResponse::ok("Author retrieved successfully", author))
}

#[utoipa::path(
    post,
    path = "/api/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body = AuthorRequest,
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 422, description = "Invalid data", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_author(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<AuthorRequest>,
) -> AppResult<ApiResponse<Author>> {
    let author = state.services.authors.create(request).await?;
    Ok(ApiResponse::created("Author created successfully", author))
}

#[utoipa::path(
    put,
    path = "/api/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Author ID")),
    request_body = AuthorRequest,
    responses(
        (status = 200, description = "Author updated", body = Author),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid data", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_author(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    ValidatedJson(request): ValidatedJson<AuthorRequest>,
) -> AppResult<ApiResponse<Author>> {
    let author = state.services.authors.update(id, request).await?;
    Ok(ApiResponse::ok("Author updated successfully", author))
}

/// Soft-delete an author
#[utoipa::path(
    delete,
    path = "/api/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Author deleted"),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_author(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<()>> {
    state.services.authors.delete(id).await?;
    Ok(ApiResponse::empty("Author deleted successfully"))
}
