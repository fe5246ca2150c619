//! Error types for CiteGraph
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for fetch, normalization and lookup failures
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling
//!
//! Exhausting every fallback relation is deliberately absent here: it is an
//! ordinary outcome of the fallback selector, not an error.

use crate::models::RelationKind;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Resource errors (4xxx)
    NodeNotFound,
    ColumnNotFound,
    TrailEntryNotFound,

    // Limits (6xxx)
    RateLimited,
    ColumnLimitReached,

    // External service errors (8xxx)
    FetchError,
    NormalizationError,
    UpstreamTimeout,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,

            // Resources (4xxx)
            ErrorCode::NodeNotFound => 4002,
            ErrorCode::ColumnNotFound => 4005,
            ErrorCode::TrailEntryNotFound => 4006,

            // Limits (6xxx)
            ErrorCode::RateLimited => 6001,
            ErrorCode::ColumnLimitReached => 6003,

            // External (8xxx)
            ErrorCode::FetchError => 8001,
            ErrorCode::NormalizationError => 8007,
            ErrorCode::UpstreamTimeout => 8008,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    // Resource errors
    #[error("Paper {id} is not part of this graph")]
    NodeNotFound { id: String },

    #[error("Column not found: {id}")]
    ColumnNotFound { id: String },

    #[error("Trail entry {index} does not exist")]
    TrailEntryNotFound { index: usize },

    // Limits
    #[error("Rate limit exceeded for {service}")]
    RateLimited { service: String },

    #[error("Column limit reached: at most {limit} columns may be open")]
    ColumnLimitReached { limit: usize },

    // Upstream errors
    #[error("Fetching {relation} failed: {message}")]
    Fetch {
        relation: RelationKind,
        message: String,
    },

    #[error("Upstream request failed: {message}")]
    Upstream { message: String },

    #[error("Malformed upstream record: {message}")]
    Normalization { message: String },

    #[error("Upstream timeout after {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            AppError::ColumnNotFound { .. } => ErrorCode::ColumnNotFound,
            AppError::TrailEntryNotFound { .. } => ErrorCode::TrailEntryNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::ColumnLimitReached { .. } => ErrorCode::ColumnLimitReached,
            AppError::Fetch { .. } => ErrorCode::FetchError,
            AppError::Upstream { .. } => ErrorCode::FetchError,
            AppError::Normalization { .. } => ErrorCode::NormalizationError,
            AppError::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            AppError::HttpClient(_) => ErrorCode::FetchError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NodeNotFound { .. } |
            AppError::ColumnNotFound { .. } |
            AppError::TrailEntryNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::ColumnLimitReached { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Fetch { .. } |
            AppError::Upstream { .. } |
            AppError::Normalization { .. } |
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether the caller should be offered a retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Fetch { .. }
                | AppError::Upstream { .. }
                | AppError::UpstreamTimeout { .. }
                | AppError::RateLimited { .. }
                | AppError::HttpClient(_)
        )
    }

    /// Attach the relation kind of a primary expansion to an upstream failure
    pub fn into_fetch(self, relation: RelationKind) -> Self {
        match self {
            AppError::Fetch { .. } => self,
            other => AppError::Fetch {
                relation,
                message: other.to_string(),
            },
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::Fetch { relation, .. } => Some(serde_json::json!({ "relation": relation })),
            AppError::Validation { field: Some(field), .. } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                retryable: self.is_retryable(),
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::NodeNotFound { id: "W1".into() };
        assert_eq!(err.code(), ErrorCode::NodeNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_fetch_error_is_retryable_gateway_error() {
        let err = AppError::Fetch {
            relation: RelationKind::Citations,
            message: "503 Service Unavailable".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.is_retryable());
        assert!(err.is_server_error());
        assert!(err.to_string().contains("citations"));
    }

    #[test]
    fn test_into_fetch_tags_relation() {
        let err = AppError::UpstreamTimeout { timeout_ms: 30_000 }.into_fetch(RelationKind::Similar);
        match err {
            AppError::Fetch { relation, .. } => assert_eq!(relation, RelationKind::Similar),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "node_id must not be empty".into(),
            field: Some("node_id".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }
}
