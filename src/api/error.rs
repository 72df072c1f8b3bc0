//! API Client Error Types
//!
//! Errors surfaced by calls to the platform API. Every failure reaches the
//! caller unchanged; nothing here retries.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur when talking to the platform API
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request did not complete within the configured timeout
    #[error("timeout")]
    Timeout,

    /// The server could not be reached
    #[error("API unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure not covered above
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not match the expected shape
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Persisted session storage failed
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Classify a transport error the way reqwest reports it
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            ApiError::Unavailable(err.to_string())
        } else {
            ApiError::Request(err)
        }
    }

    /// HTTP status of a rejected response, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the credentials or token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
