//! Error kinds shared by the store, the workflows and the HTTP boundary.
//!
//! The core returns `Result<_, CareError>`; the api layer turns a kind into a
//! status code and a generic client-facing message. Details stay in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CareError {
    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type CareResult<T> = Result<T, CareError>;

impl CareError {
    /// Stable machine-readable code, sent to clients next to the generic message.
    pub fn code(&self) -> &'static str {
        match self {
            CareError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            CareError::NotFound(_) => "NOT_FOUND",
            CareError::Validation(_) => "VALIDATION_ERROR",
            CareError::TransactionFailure(_) => "TRANSACTION_FAILURE",
            CareError::Notification(_) => "NOTIFICATION_ERROR",
            CareError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CareError::Validation(_) => StatusCode::BAD_REQUEST,
            CareError::NotFound(_) => StatusCode::NOT_FOUND,
            CareError::UpstreamUnavailable(_) | CareError::Notification(_) => StatusCode::BAD_GATEWAY,
            CareError::TransactionFailure(_) => StatusCode::BAD_REQUEST,
            CareError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            CareError::Validation(_) | CareError::TransactionFailure(_) => "Bad request",
            CareError::NotFound(_) => "Resource not found",
            CareError::UpstreamUnavailable(_) => "Medication database unavailable",
            CareError::Notification(_) => "Caretaker notification failed",
            CareError::Database(_) => "Internal server error",
        }
    }

    /// Wraps a mid-batch failure. Kinds that already describe the cause are kept.
    pub fn into_transaction_failure(self) -> Self {
        match self {
            CareError::Database(msg) => CareError::TransactionFailure(msg),
            other => other,
        }
    }
}

impl From<rusqlite::Error> for CareError {
    fn from(e: rusqlite::Error) -> Self {
        CareError::Database(e.to_string())
    }
}

impl From<r2d2::Error> for CareError {
    fn from(e: r2d2::Error) -> Self {
        CareError::Database(format!("Failed to get connection from pool: {}", e))
    }
}

impl From<chrono::ParseError> for CareError {
    fn from(e: chrono::ParseError) -> Self {
        CareError::Database(format!("Failed to parse timestamp: {}", e))
    }
}

impl From<validator::ValidationErrors> for CareError {
    fn from(e: validator::ValidationErrors) -> Self {
        CareError::Validation(e.to_string())
    }
}

/// Body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

impl IntoResponse for CareError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.public_message().to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
