//! Client error types

use prolink_shared::StoreError;

/// Error type for client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid request path: {0}")]
    InvalidPath(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

impl ClientError {
    /// Returns true if this error is transient and a later retry may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Timeout(_) => true,
            ClientError::Status { status, .. } => *status >= 500 || *status == 429,

            ClientError::Json(_) => false,
            ClientError::InvalidPath(_) => false,
            ClientError::Unauthorized => false,
            ClientError::Store(_) => false,
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
