//! Loan management endpoints

use axum::extract::{Path, State};

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, Loan, LoanDetails, UpdateLoan},
    AppState,
};

use super::{ApiResponse, AuthenticatedUser, ValidatedJson};

/// List active loans with borrower and book
#[utoipa::path(
    get,
    path = "/api/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active loans", body = Vec<LoanDetails>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<ApiResponse<Vec<LoanDetails>>> {
    let loans = state.services.loans.list().await?;
    Ok(ApiResponse::ok("Loans retrieved successfully", loans))
}

#[utoipa::path(
    get,
    path = "/api/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<Loan>> {
    let loan = state.services.loans.get(id).await?;
    Ok(ApiResponse::ok("Loan retrieved successfully", loan))
}

/// Borrow a book for the authenticated user
#[utoipa::path(
    post,
    path = "/api/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Book already loaned", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid dates", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateLoan>,
) -> AppResult<ApiResponse<Loan>> {
    let loan = state
        .services
        .loans
        .create_loan(claims.user_id, request)
        .await?;
    Ok(ApiResponse::created("Loan created successfully", loan))
}

/// Record the return date of a loan
#[utoipa::path(
    put,
    path = "/api/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = UpdateLoan,
    responses(
        (status = 200, description = "Loan updated", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    ValidatedJson(request): ValidatedJson<UpdateLoan>,
) -> AppResult<ApiResponse<Loan>> {
    let loan = state
        .services
        .loans
        .return_loan(id, request.return_date)
        .await?;
    Ok(ApiResponse::ok("Loan updated successfully", loan))
}

#[utoipa::path(
    delete,
    path = "/api/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan deleted"),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_loan(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<()>> {
    state.services.loans.delete(id).await?;
    Ok(ApiResponse::empty("Loan deleted successfully"))
}
