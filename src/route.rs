//! Route definitions for the rental-tracking API
//!
//! This module configures all HTTP routes and maps them to their
//! respective handlers. Every endpoint is part of the admin dashboard API
//! and sits behind the admin-token middleware.

use axum::routing::{get, post};
use axum::Router;

use crate::database::AppState;
use crate::handler::{
    bulk_extend, create_rental, dashboard, extend_rental, get_rental, list_books, list_rentals,
    return_rental, search_catalog, student_dashboard,
};

use crate::middleware::admin_auth_middleware;
use axum::middleware;

/// Creates and configures the Axum application router
///
/// # Route Definitions
///
/// - `GET  /api/books/search?q=` - Looks a title up in the external catalog
/// - `GET  /api/books` - Lists stored books (search + pagination)
/// - `GET  /api/rentals` - Lists rentals (status/search filters, pagination)
/// - `POST /api/rentals` - Creates a rental
/// - `GET  /api/rentals/{id}` - Fetches one rental
/// - `POST /api/rentals/{id}/extend` - Extends a rental
/// - `POST /api/rentals/{id}/return` - Marks a rental returned
/// - `POST /api/rentals/bulk-extend` - Extends several rentals at once
/// - `GET  /api/dashboard` - Admin dashboard totals
/// - `GET  /api/students` - Per-student rollups
///
/// # Arguments
///
/// * `state` - Application state with the shared database and catalog
///   client
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/books/search", get(search_catalog))
        .route("/books", get(list_books))
        .route("/rentals", get(list_rentals).post(create_rental))
        .route("/rentals/bulk-extend", post(bulk_extend))
        .route("/rentals/{id}", get(get_rental))
        .route("/rentals/{id}/extend", post(extend_rental))
        .route("/rentals/{id}/return", post(return_rental))
        .route("/dashboard", get(dashboard))
        .route("/students", get(student_dashboard))
        .layer(middleware::from_fn(admin_auth_middleware));

    Router::new()
        // Mount the admin API under /api
        .nest("/api", api_routes)
        // Inject the application state into all handlers
        .with_state(state)
}
