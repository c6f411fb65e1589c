//! Error kinds for calls against the coding API.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// API call errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unable to connect to {0}")]
    Network(String),

    #[error("Server returned HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Coarse error classification shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    TimeoutError,
    NetworkError,
    ServerError,
    UnknownError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::ValidationError => "validation",
            ErrorKind::TimeoutError => "timeout",
            ErrorKind::NetworkError => "network",
            ErrorKind::ServerError => "server",
            ErrorKind::UnknownError => "error",
        };
        f.write_str(label)
    }
}

impl ApiError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::ValidationError,
            ApiError::Timeout(_) => ErrorKind::TimeoutError,
            ApiError::Network(_) => ErrorKind::NetworkError,
            ApiError::Server { .. } => ErrorKind::ServerError,
            ApiError::InvalidResponse(_) | ApiError::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    /// Message suitable for an alert or inline error.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Timeout(_) => "Request timed out. Please try again.".to_string(),
            ApiError::Network(_) => {
                "Unable to connect to the server. Please check your internet connection."
                    .to_string()
            }
            ApiError::Server { status, .. } => {
                format!("Server error ({}). Please try again.", status)
            }
            ApiError::InvalidResponse(_) | ApiError::Unknown(_) => {
                "An unexpected error occurred.".to_string()
            }
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Timeouts are surfaced immediately rather than retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
