//! Downstream call errors.

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Every way an outbound call can fail. The circuit breaker treats all of them alike.
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// Downstream answered with a non-2xx status.
    #[error("downstream returned {0}")]
    Status(StatusCode),

    /// Connection refused, reset, DNS failure, ...
    #[error("connection failed: {0}")]
    Connect(String),

    /// Response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// No response within the call deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The outbound request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DownstreamError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DownstreamError::Status(_) => "status",
            DownstreamError::Connect(_) => "connect",
            DownstreamError::Body(_) => "body",
            DownstreamError::Timeout(_) => "timeout",
            DownstreamError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DownstreamError::Status(status) => Some(*status),
            _ => None,
        }
    }
}
