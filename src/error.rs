//! Error taxonomy shared by context construction, signing and request execution.

use reqwest::StatusCode;
use std::fmt;

/// A non-success `status` reported in the body of an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Status string from the remote API (e.g. `INVALID_REQUEST`).
    pub status: String,
    /// The body's `error_message`, when the API supplied one.
    pub message: Option<String>,
}

impl ApiError {
    /// Error for a body whose `status` is neither `OK` nor `ZERO_RESULTS`.
    pub fn new(status: impl Into<String>, message: Option<String>) -> Self {
        Self {
            status: status.into(),
            message,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({})", self.status, message),
            None => write!(f, "{}", self.status),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or inconsistent credentials, conflicting timeouts, malformed secret.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Non-200 HTTP status that was not retried, or whose retry budget ran out.
    #[error("HTTP {status} error")]
    Transport { status: StatusCode },

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Connection, DNS or TLS failure. Surfaced as-is, never retried here.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A 200 response whose body is not a JSON object with a `status` field.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the executor would schedule another attempt for this error,
    /// provided the retry budget is not yet spent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { status } => crate::http::RETRYABLE_STATUSES.contains(status),
            Error::Api(api) => api.status == crate::http::OVER_QUERY_LIMIT,
            _ => false,
        }
    }

    /// The remote status carried by this error, if any.
    pub fn status(&self) -> Option<String> {
        match self {
            Error::Transport { status } => Some(status.as_u16().to_string()),
            Error::Api(api) => Some(api.status.clone()),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_without_message() {
        let err = ApiError::new("REQUEST_DENIED", None);
        assert_eq!(err.to_string(), "REQUEST_DENIED");
    }

    #[test]
    fn test_api_error_display_with_message() {
        let err = ApiError::new("INVALID_REQUEST", Some("bad param".to_string()));
        assert_eq!(err.to_string(), "INVALID_REQUEST (bad param)");
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(
            Error::Transport {
                status: StatusCode::SERVICE_UNAVAILABLE
            }
            .is_retryable()
        );
        assert!(
            Error::Transport {
                status: StatusCode::GATEWAY_TIMEOUT
            }
            .is_retryable()
        );
        assert!(
            !Error::Transport {
                status: StatusCode::NOT_FOUND
            }
            .is_retryable()
        );
        assert!(
            !Error::Transport {
                status: StatusCode::BAD_GATEWAY
            }
            .is_retryable()
        );
        assert!(Error::Api(ApiError::new("OVER_QUERY_LIMIT", None)).is_retryable());
        assert!(!Error::Api(ApiError::new("INVALID_REQUEST", None)).is_retryable());
        assert!(!Error::Configuration("nope".to_string()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_status() {
        let err = Error::Transport {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert_eq!(err.status().as_deref(), Some("500"));

        let err = Error::from(ApiError::new("NOT_FOUND", None));
        assert_eq!(err.status().as_deref(), Some("NOT_FOUND"));

        assert_eq!(Error::Cancelled.status(), None);
    }

    #[test]
    fn test_api_error_converts_into_error() {
        let err: Error = ApiError::new("INVALID_REQUEST", Some("bad param".to_string())).into();
        assert_eq!(err.to_string(), "API error: INVALID_REQUEST (bad param)");
    }
}
