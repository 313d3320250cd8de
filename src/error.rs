//! Error handling for the micro-climate server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error (malformed webcam source etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fetch error (network, timeout, non-2xx, empty payload)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Decode error (malformed image bytes)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Analysis error (unexpected processing fault)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Publish error (subscriber unreachable)
    #[error("Publish error: {0}")]
    Publish(String),

    /// Cache error (result store backend)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Redis error (cache mirror)
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::Fetch(msg) => (StatusCode::BAD_GATEWAY, "FETCH_ERROR", msg.clone()),
            Error::Decode(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "DECODE_ERROR", msg.clone()),
            Error::Analysis(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ANALYSIS_ERROR",
                msg.clone(),
            ),
            Error::Publish(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PUBLISH_ERROR",
                msg.clone(),
            ),
            Error::Cache(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CACHE_ERROR",
                msg.clone(),
            ),
            Error::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                msg.clone(),
            ),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string()),
            Error::Redis(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CACHE_ERROR",
                e.to_string(),
            ),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
