//! Error types for sous-ai

use thiserror::Error;

/// Result type alias using sous-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the cooking assistant backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (connection refused, dropped mid-body, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend rejected the bearer credential
    #[error("Unauthorized: the credential was rejected")]
    Unauthorized,

    /// The backend answered with a non-success status
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// A partial frame grew past the decoder's limit without a delimiter
    #[error("Frame exceeds {limit} bytes without a delimiter")]
    BufferOverflow { limit: usize },

    /// Invalid configuration (bad base URL, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request was aborted by the caller
    #[error("Request aborted")]
    Aborted,
}

impl Error {
    /// Create a status error from a code and response body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Whether the backend rejected the credential
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::Unauthorized => true,
            Error::Status { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Check if this error is transient and the call may be repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
