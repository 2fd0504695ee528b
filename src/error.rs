//! Crate-wide error taxonomy.
//!
//! `CodeDoxError` classifies every failure mode named in the error design
//! (`ValidationError`, `NotFoundError`, ...). Boundary code (HTTP handlers,
//! MCP tool handlers) maps a kind to a transport-specific envelope; internal
//! code just propagates `Result<T, CodeDoxError>` with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CodeDoxError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("extract error: {0}")]
    Extract(String),

    #[error("annotator error: {0}")]
    Annotator(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("authentication error")]
    Auth,

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl CodeDoxError {
    /// Short machine-readable kind tag used in MCP error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::NotFound(_) => "NotFoundError",
            Self::Conflict(_) => "ConflictError",
            Self::Fetch(_) => "FetchError",
            Self::Extract(_) => "ExtractError",
            Self::Annotator(_) => "AnnotatorError",
            Self::Storage(_) => "StorageError",
            Self::Auth => "AuthError",
            Self::Cancelled => "CancelledError",
            Self::Internal(_) => "InternalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::Cancelled => StatusCode::from_u16(499).unwrap(),
            Self::Fetch(_) | Self::Extract(_) | Self::Annotator(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable, non-leaky message shown to callers for internal failures.
    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    kind: &'static str,
    message: String,
}

impl IntoResponse for CodeDoxError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Internal(ref msg)) {
            tracing::error!(error = %msg, "internal error");
        }
        let body = ErrorBody {
            status: "error",
            kind: self.kind(),
            message: self.public_message(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<diesel::result::Error> for CodeDoxError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound("row not found".to_string()),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => Self::Conflict(info.message().to_string()),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for CodeDoxError {
    fn from(e: reqwest::Error) -> Self {
        Self::Fetch(e.to_string())
    }
}

impl From<std::io::Error> for CodeDoxError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for CodeDoxError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodeDoxError>;
