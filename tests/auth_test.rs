//! Tests for the admin-token middleware
//!
//! The admin API is open when `ADMIN_TOKEN` is unset and requires a
//! matching `Authorization` header when it is set.

use std::env;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use bookrental::catalog::{CatalogClient, CatalogError, SearchPage};
use bookrental::database::{init_db, AppState};
use bookrental::route::create_app;

// Mutex to ensure tests that modify env vars don't run in parallel
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Catalog stub that never finds anything; these tests only exercise the
/// middleware in front of the handlers.
struct EmptyCatalog;

#[async_trait]
impl CatalogClient for EmptyCatalog {
    async fn search(&self, _query: &str) -> Result<SearchPage, CatalogError> {
        Ok(SearchPage::default())
    }

    async fn edition_page_count(
        &self,
        _edition_key: &str,
    ) -> Result<Option<u32>, CatalogError> {
        Ok(None)
    }
}

fn setup_test_app() -> (axum::Router, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = temp_db.path().to_str().unwrap();
    let db = init_db(db_path).expect("Failed to initialize test database");
    let state = AppState {
        db: Arc::new(db),
        catalog: Arc::new(EmptyCatalog),
    };
    (create_app(state), temp_db)
}

async fn list_rentals_with_header(
    app: axum::Router,
    auth_header: Option<&str>,
) -> StatusCode {
    let mut builder = Request::builder().method("GET").uri("/api/rentals");
    if let Some(value) = auth_header {
        builder = builder.header("Authorization", value);
    }
    let response = app
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    response.status()
}

#[tokio::test]
async fn test_admin_token_enabled_valid_token() {
    let _guard = ENV_MUTEX.lock().unwrap();
    env::set_var("ADMIN_TOKEN", "secret_token");

    let (app, _temp_db) = setup_test_app();
    let status = list_rentals_with_header(app, Some("secret_token")).await;
    assert_eq!(status, StatusCode::OK);

    env::remove_var("ADMIN_TOKEN");
}

#[tokio::test]
async fn test_admin_token_enabled_invalid_token() {
    let _guard = ENV_MUTEX.lock().unwrap();
    env::set_var("ADMIN_TOKEN", "secret_token");

    let (app, _temp_db) = setup_test_app();
    let status = list_rentals_with_header(app, Some("wrong_token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    env::remove_var("ADMIN_TOKEN");
}

#[tokio::test]
async fn test_admin_token_enabled_missing_header() {
    let _guard = ENV_MUTEX.lock().unwrap();
    env::set_var("ADMIN_TOKEN", "secret_token");

    let (app, _temp_db) = setup_test_app();
    let status = list_rentals_with_header(app, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    env::remove_var("ADMIN_TOKEN");
}

#[tokio::test]
async fn test_admin_token_unset_is_open() {
    let _guard = ENV_MUTEX.lock().unwrap();
    env::remove_var("ADMIN_TOKEN");

    let (app, _temp_db) = setup_test_app();
    let status = list_rentals_with_header(app, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_token_empty_is_open() {
    let _guard = ENV_MUTEX.lock().unwrap();
    env::set_var("ADMIN_TOKEN", "");

    let (app, _temp_db) = setup_test_app();
    let status = list_rentals_with_header(app, None).await;
    assert_eq!(status, StatusCode::OK);

    env::remove_var("ADMIN_TOKEN");
}
