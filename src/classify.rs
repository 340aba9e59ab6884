//! Classification of failed requests into error codes

use crate::error::ErrorCode;

/// How a single attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// A response arrived with a non-success status
    Status(u16),
    /// No response: connection refused, reset, DNS failure...
    Transport,
    /// The attempt was aborted by its deadline
    Timeout,
}

impl Failure {
    pub fn classify(self) -> ErrorCode {
        match self {
            Self::Status(status) => classify(Some(status), false),
            Self::Transport => classify(None, false),
            Self::Timeout => classify(None, true),
        }
    }
}

/// Map an optional HTTP status and a timeout indicator to an error code.
///
/// Total over all inputs. A deadline overrun wins over any status.
pub fn classify(status: Option<u16>, timed_out: bool) -> ErrorCode {
    if timed_out {
        return ErrorCode::Timeout;
    }

    match status {
        None => ErrorCode::NetworkError,
        Some(400) => ErrorCode::InvalidRequest,
        Some(401) => ErrorCode::Unauthorized,
        Some(403) => ErrorCode::Forbidden,
        Some(404) => ErrorCode::NotFound,
        Some(429) => ErrorCode::RateLimited,
        Some(500..=599) => ErrorCode::ServerError,
        Some(_) => ErrorCode::UnknownError,
    }
}

/// Whether a failure with the given code should be retried
pub fn is_retryable(code: ErrorCode) -> bool {
    code.is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        let cases = vec![
            (400, ErrorCode::InvalidRequest),
            (401, ErrorCode::Unauthorized),
            (403, ErrorCode::Forbidden),
            (404, ErrorCode::NotFound),
            (429, ErrorCode::RateLimited),
            (500, ErrorCode::ServerError),
            (502, ErrorCode::ServerError),
            (503, ErrorCode::ServerError),
            (599, ErrorCode::ServerError),
            (418, ErrorCode::UnknownError),
            (409, ErrorCode::UnknownError),
        ];

        for (status, expected) in cases {
            assert_eq!(classify(Some(status), false), expected, "status {}", status);
        }
    }

    #[test]
    fn test_no_response() {
        assert_eq!(classify(None, false), ErrorCode::NetworkError);
        assert_eq!(classify(None, true), ErrorCode::Timeout);
        assert_eq!(Failure::Transport.classify(), ErrorCode::NetworkError);
        assert_eq!(Failure::Timeout.classify(), ErrorCode::Timeout);
    }

    #[test]
    fn test_unexpected_statuses_are_unknown() {
        for status in [0u16, 100, 204, 302, 600, 999] {
            assert_eq!(classify(Some(status), false), ErrorCode::UnknownError);
        }
    }

    #[test]
    fn test_classification_is_pure() {
        for status in 0..1000u16 {
            let first = classify(Some(status), false);
            for _ in 0..3 {
                assert_eq!(classify(Some(status), false), first);
            }
        }
    }

    #[test]
    fn test_retry_eligibility() {
        assert!(is_retryable(Failure::Status(429).classify()));
        assert!(is_retryable(Failure::Status(503).classify()));
        assert!(is_retryable(Failure::Transport.classify()));
        assert!(is_retryable(Failure::Timeout.classify()));
        for status in [400, 401, 403, 404, 418] {
            assert!(!is_retryable(Failure::Status(status).classify()));
        }
    }
}
