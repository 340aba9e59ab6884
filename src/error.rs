//! Error types for the DepHealth client

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of classified failure codes for a single API request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// 400
    InvalidRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 429
    RateLimited,
    /// Any 5xx
    ServerError,
    /// No response received
    NetworkError,
    /// Attempt exceeded its deadline
    Timeout,
    /// Anything else, e.g. 418
    UnknownError,
}

impl ErrorCode {
    /// Wire name of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::UnknownError => "unknown_error",
        }
    }

    /// Whether a request failing with this code may be attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::NetworkError | Self::Timeout
        )
    }

    /// Whether this code means no further scanning can succeed for the account
    pub fn is_scan_fatal(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Unauthorized | Self::Forbidden)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecoverable failure of one logical API request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ApiClientError {
    pub code: ErrorCode,
    /// HTTP status, absent for transport failures and timeouts
    pub status: Option<u16>,
    pub message: String,
    /// Value of the `Retry-After` header on rate-limited responses
    pub retry_after: Option<Duration>,
}

impl ApiClientError {
    pub fn new(code: ErrorCode, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

/// Main error type for client operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("API request failed: {0}")]
    Api(#[from] ApiClientError),

    #[error("Invalid response body from {endpoint}: {source}")]
    InvalidResponse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("Failed to parse manifest {path}: {message}")]
    ManifestParse { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scan cancelled after {completed} of {total} chunks")]
    Cancelled { completed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a manifest parse error
    pub fn manifest_parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ManifestParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classified code when this error came from the API
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Api(e) => Some(e.code),
            _ => None,
        }
    }

    /// Whether the error should abort a multi-chunk scan
    pub fn is_scan_fatal(&self) -> bool {
        self.code().map(|c| c.is_scan_fatal()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_codes() {
        let retryable = [
            ErrorCode::RateLimited,
            ErrorCode::ServerError,
            ErrorCode::NetworkError,
            ErrorCode::Timeout,
        ];
        let terminal = [
            ErrorCode::InvalidRequest,
            ErrorCode::Unauthorized,
            ErrorCode::Forbidden,
            ErrorCode::NotFound,
            ErrorCode::UnknownError,
        ];

        assert!(retryable.iter().all(|c| c.is_retryable()));
        assert!(terminal.iter().all(|c| !c.is_retryable()));
    }

    #[test]
    fn test_scan_fatal_codes() {
        assert!(ErrorCode::RateLimited.is_scan_fatal());
        assert!(ErrorCode::Unauthorized.is_scan_fatal());
        assert!(ErrorCode::Forbidden.is_scan_fatal());
        assert!(!ErrorCode::ServerError.is_scan_fatal());
        assert!(!ErrorCode::NotFound.is_scan_fatal());
    }

    #[test]
    fn test_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
        assert_eq!(ErrorCode::InvalidRequest.to_string(), "invalid_request");
    }

    #[test]
    fn test_error_code_passthrough() {
        let err: Error = ApiClientError::new(ErrorCode::Forbidden, Some(403), "nope").into();
        assert_eq!(err.code(), Some(ErrorCode::Forbidden));
        assert!(err.is_scan_fatal());
        assert!(!Error::config("bad").is_scan_fatal());
    }
}
