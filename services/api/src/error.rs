//! services/api/src/error.rs
//!
//! Defines the startup error type for the API service and the error every
//! route handler returns.

use crate::config::ConfigError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use simricare_core::ports::PortError;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// A handler failure, rendered as `{ "success": false, "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The bearer token or session cookie is missing or invalid.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller is signed in but lacks the required role.
    #[error("{0}")]
    Forbidden(String),

    /// Unknown ids, duplicate writes and illegal status changes.
    #[error("{0}")]
    Rejected(String),

    /// Anything else; the cause is logged, the client sees `message`.
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        cause: PortError,
    },
}

impl RouteError {
    pub fn validation(message: impl Into<String>) -> Self {
        RouteError::Validation(message.into())
    }

    /// Maps a port failure; unexpected errors become a 500 with `message`.
    pub fn from_port(cause: PortError, message: &str) -> Self {
        match cause {
            PortError::Invalid(m) => RouteError::Validation(m),
            PortError::NotFound(m) | PortError::Conflict(m) => RouteError::Rejected(m),
            PortError::Unauthorized => RouteError::Unauthorized("인증이 필요합니다.".to_string()),
            cause @ PortError::Unexpected(_) => RouteError::Internal {
                message: message.to_string(),
                cause,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::Validation(_) | RouteError::Rejected(_) => StatusCode::BAD_REQUEST,
            RouteError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RouteError::Forbidden(_) => StatusCode::FORBIDDEN,
            RouteError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for RouteError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Content-Type: application/json 헤더가 필요합니다.".to_string()
            }
            _ => format!("요청 본문을 해석할 수 없습니다: {}", rejection.body_text()),
        };
        RouteError::Validation(message)
    }
}

impl From<QueryRejection> for RouteError {
    fn from(rejection: QueryRejection) -> Self {
        RouteError::Validation(format!(
            "쿼리 문자열을 해석할 수 없습니다: {}",
            rejection.body_text()
        ))
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let RouteError::Internal { message, cause } = &self {
            error!("{}: {:?}", message, cause);
        }
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// The result type of every JSON route handler.
pub type RouteResult<T> = Result<T, RouteError>;
