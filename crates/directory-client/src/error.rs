//! Error types for directory operations.
//!
//! Every failure carries enough context to decide whether the caller may
//! retry, and enough of the remote response to debug a rejection without
//! re-running the request.

use thiserror::Error;

/// Errors during directory API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The directory answered with a non-success status.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// The request did not complete within the configured timeout.
    #[error("Request timeout")]
    Timeout,

    /// The client or a request URL could not be constructed.
    #[error("Client configuration error: {message}")]
    Configuration { message: String },

    /// The response body was not valid JSON.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Network, TLS or protocol failure.
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl ApiError {
    /// Classify a transport-level failure, separating timeouts from other
    /// network errors.
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::HttpClientError(error)
        }
    }

    /// Check if this error represents a transient condition that may succeed if retried.
    ///
    /// Transient conditions include:
    /// - Server errors (5xx)
    /// - Rate limiting (429)
    /// - Request timeouts
    /// - Network/transport errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout => true,
            Self::Configuration { .. } => false,
            Self::JsonError(_) => false,
            Self::HttpClientError(_) => true,
        }
    }

    /// HTTP status returned by the directory, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout | Self::HttpClientError(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
