//! Book endpoints

use axum::extract::{Path, State};

use crate::{
    error::AppResult,
    models::book::{Book, BookRequest},
    AppState,
};

use super::{ApiResponse, AuthenticatedUser, ValidatedJson};

/// List books with their authors
#[utoipa::path(
    get,
    path = "/api/books",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All books", body = Vec<Book>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<ApiResponse<Vec<Book>>> {
    let books = state.services.books.list().await?;
    Ok(ApiResponse::ok("Books retrieved successfully", books))
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<Book>> {
    let book = state.services.books.get(id).await?;
    Ok(ApiResponse::ok("Book retrieved successfully", book))
}

/// Create a book and attach its authors
#[utoipa::path(
    post,
    path = "/api/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookRequest,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 422, description = "Invalid data or unknown author", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<BookRequest>,
) -> AppResult<ApiResponse<Book>> {
    let book = state.services.books.create(request).await?;
    Ok(ApiResponse::created("Book created successfully", book))
}

/// Update a book; its author set is replaced by the payload's
#[utoipa::path(
    put,
    path = "/api/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid data or unknown author", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    ValidatedJson(request): ValidatedJson<BookRequest>,
) -> AppResult<ApiResponse<Book>> {
    let book = state.services.books.update(id, request).await?;
    Ok(ApiResponse::ok("Book updated successfully", book))
}

#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<()>> {
    state.services.books.delete(id).await?;
    Ok(ApiResponse::empty("Book deleted successfully"))
}
