//! Error types shared across the service.
//!
//! `StoreError` is what the data source adapter surfaces once its retries are
//! exhausted. `ApiError` is the HTTP boundary: each variant maps to one status
//! code and JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ---

/// Errors raised by the data source adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A query failed on every retry attempt.
    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// The connection pool could not be established at startup.
    #[error("failed to connect to {target} after {attempts} attempts: {source}")]
    Connect {
        target: String,
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
}

/// Errors returned to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No token provided")]
    MissingToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("unsupported export type: {0}")]
    UnsupportedExport(String),

    #[error("export failed: {0}")]
    Export(#[source] StoreError),

    #[error("access log query failed: {0}")]
    AccessLogs(#[source] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, body) = match &self {
            ApiError::MissingToken | ApiError::ExpiredToken | ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, json!({ "message": self.to_string() }))
            }
            ApiError::InvalidToken => (StatusCode::FORBIDDEN, json!({ "message": self.to_string() })),
            ApiError::UnsupportedExport(_) | ApiError::Export(_) => {
                tracing::error!("Export error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to export data" }),
                )
            }
            ApiError::AccessLogs(source) => {
                tracing::error!("Error fetching access logs: {}", source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Failed to fetch access logs",
                        "details": source.to_string(),
                    }),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::ExpiredToken,
            _ => ApiError::InvalidToken,
        }
    }
}
