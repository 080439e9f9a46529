//! API integration tests
//!
//! The router is driven in-process against the in-memory store and cache.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_api::{
    api,
    cache::Cache,
    config::AppConfig,
    repository::{CachePolicy, Repository},
    services::{notifications::LogNotifier, Services},
    store::MemoryStore,
    AppState,
};

fn app() -> Router {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "integration-secret".to_string();

    let repository = Repository::new(
        Arc::new(MemoryStore::new()),
        Cache::memory(),
        CachePolicy::from(&config.cache),
    );
    let services = Services::new(repository, config.auth.clone(), Arc::new(LogNotifier));

    api::create_router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Sign up and log in; returns the token
async fn register(app: &Router, email: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"name": "User 1", "email": email, "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"email": email, "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["access_token"].as_str().unwrap().to_string()
}

async fn create_book(app: &Router, token: &str, title: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/books",
        Some(token),
        Some(json!({"title": title, "publication_year": 2020})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_login() {
    let app = app();
    register(&app, "u1@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"email": "u1@example.com", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["expires_in"], 360);
    assert_eq!(body["data"]["user"]["email"], "u1@example.com");
    assert!(body["data"]["user"].get("password").is_none());
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let app = app();
    register(&app, "u1@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"email": "u1@example.com", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authorization Token not found");

    let (status, body) = send(&app, Method::GET, "/api/books", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token is Invalid");
}

#[tokio::test]
async fn test_signup_validation() {
    let app = app();
    register(&app, "u1@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"name": "Other", "email": "u1@example.com", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "The email has already been taken");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"name": "Other", "email": "not-an-email", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");

    let (status, _) = send(&app, Method::POST, "/api/users", None, Some(json!({"name": "Other"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_book_with_author() {
    let app = app();
    let token = register(&app, "u1@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/authors",
        Some(&token),
        Some(json!({"name": "John Doe"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let author_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/books",
        Some(&token),
        Some(json!({
            "title": "The Book",
            "publication_year": 2020,
            "authors": [{"author_id": author_id}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["authors"][0]["name"], "John Doe");

    let (status, body) = send(&app, Method::GET, "/api/books", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let books = body["data"].as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["title"], "The Book");
    assert_eq!(books[0]["authors"][0]["id"], author_id);

    let (_, body) = send(&app, Method::GET, &format!("/api/authors/{}", author_id), Some(&token), None).await;
    assert_eq!(body["data"]["books"][0]["title"], "The Book");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/books",
        Some(&token),
        Some(json!({
            "title": "Orphan",
            "publication_year": 2020,
            "authors": [{"author_id": 9999}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_book_delete_and_update_missing() {
    let app = app();
    let token = register(&app, "u1@example.com").await;
    let book_id = create_book(&app, &token, "The Book").await;

    let (status, body) = send(&app, Method::DELETE, &format!("/api/books/{}", book_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Null);

    let (status, _) = send(&app, Method::GET, &format!("/api/books/{}", book_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/books/9999",
        Some(&token),
        Some(json!({"title": "Ghost", "publication_year": 2020})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_loan_lifecycle() {
    let app = app();
    let token = register(&app, "u1@example.com").await;
    let book_id = create_book(&app, &token, "The Book").await;
    let loan = json!({"book_id": book_id, "loan_date": "2022-01-01", "due_date": "2022-01-02"});

    let (status, body) = send(&app, Method::POST, "/api/loans", Some(&token), Some(loan.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["return_date"], Value::Null);
    let loan_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, Method::POST, "/api/loans", Some(&token), Some(loan.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book already loaned");

    let (_, body) = send(&app, Method::GET, "/api/loans", Some(&token), None).await;
    let loans = body["data"].as_array().unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0]["user"]["email"], "u1@example.com");
    assert_eq!(loans[0]["book"]["title"], "The Book");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/loans/{}", loan_id),
        Some(&token),
        Some(json!({"return_date": "2022-01-03"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["return_date"], "2022-01-03");

    let (_, body) = send(&app, Method::GET, "/api/loans", Some(&token), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, Method::POST, "/api/loans", Some(&token), Some(loan)).await;
    assert_eq!(status, StatusCode::CREATED);
    let second_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(&app, Method::DELETE, &format!("/api/loans/{}", second_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, &format!("/api/loans/{}", second_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_loan_validation() {
    let app = app();
    let token = register(&app, "u1@example.com").await;
    let book_id = create_book(&app, &token, "The Book").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/loans",
        Some(&token),
        Some(json!({"book_id": 9999, "loan_date": "2022-01-01", "due_date": "2022-01-02"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/loans",
        Some(&token),
        Some(json!({"book_id": book_id, "loan_date": "2022-01-05", "due_date": "2022-01-02"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/loans",
        Some(&token),
        Some(json!({"book_id": book_id, "loan_date": "yesterday", "due_date": "2022-01-02"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_user_delete_removes_loans() {
    let app = app();
    let token = register(&app, "u1@example.com").await;
    let book_id = create_book(&app, &token, "The Book").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/loans",
        Some(&token),
        Some(json!({"book_id": book_id, "loan_date": "2022-01-01", "due_date": "2022-01-02"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = body["data"]["user_id"].as_i64().unwrap();

    let (_, body) = send(&app, Method::GET, "/api/loans", Some(&token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/users/{}", user_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, "/api/loans", Some(&token), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::GET, &format!("/api/users/{}", user_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
