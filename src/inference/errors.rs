//! Inference error types.
//!
//! Structured logging is the caller's responsibility; these types carry the
//! context needed to build meaningful log entries.

use thiserror::Error;

/// Errors that can occur while calling the model.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body was not a valid chat completion.
    #[error("invalid model response: {reason}")]
    InvalidResponse { reason: String },

    /// Client construction or configuration problem.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = InferenceError::HttpError {
            status: 500,
            body: "test body".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: test body");
    }

    #[test]
    fn test_timeout_display() {
        let err = InferenceError::Timeout { duration_secs: 5 };
        assert_eq!(err.to_string(), "inference timeout after 5s");
    }
}
