//! Application error type shared by all handlers
//!
//! Every handler returns `Result<_, AppError>` and lets `?` do the
//! plumbing; the `IntoResponse` impl maps each variant to an HTTP status
//! with a small JSON body.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    /// The rental exists but is not in a state that allows the requested
    /// operation (extending or returning a non-active rental).
    #[error("{0}")]
    PreconditionViolation(String),
    #[error("could not open a database transaction")]
    Transaction(#[from] redb::TransactionError),
    #[error("could not open a database table")]
    Table(#[from] redb::TableError),
    #[error("database storage error")]
    Storage(#[from] redb::StorageError),
    #[error("could not commit a database transaction")]
    Commit(#[from] redb::CommitError),
    #[error("stored record could not be decoded")]
    CorruptRecord(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PreconditionViolation(_) => StatusCode::CONFLICT,
            e @ (AppError::Transaction(_)
            | AppError::Table(_)
            | AppError::Storage(_)
            | AppError::Commit(_)
            | AppError::CorruptRecord(_)) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "unexpected error while handling request"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
