//! API error handling.
//!
//! Errors are returned as plain text so a client can surface the body as-is.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shard_core::error::{ErrorKind, ShardError};

/// Body sent when a host has never announced.
pub const NOT_FOUND_MESSAGE: &str = "no record of that host";

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// The host has no stored announcement.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Returns the HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

impl From<ShardError> for ApiError {
    fn from(err: ShardError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => ApiError::not_found(),
            ErrorKind::Invalid => ApiError::bad_request(err.to_string()),
            _ => {
                tracing::error!(error = %err, "Index lookup failed");
                ApiError::internal(err.to_string())
            }
        }
    }
}
