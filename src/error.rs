//! Error types for backend fetches
//!
//! Errors are classified by recoverability:
//! - Retryable: network failures, empty bodies, malformed payloads
//! - NonRetryable: missing or malformed base URL

use thiserror::Error;

/// Error types for a single endpoint fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    // Non-retryable errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Retryable errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Empty response body")]
    EmptyBody,

    #[error("Failed to decode payload: {0}")]
    Decode(String),
}

impl FetchError {
    /// Returns true if another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport(_) | FetchError::EmptyBody | FetchError::Decode(_)
        )
    }

    /// Short label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Config(_) => "config",
            FetchError::Transport(_) => "transport",
            FetchError::EmptyBody => "empty-body",
            FetchError::Decode(_) => "decode",
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        FetchError::Config(format!("invalid base URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_not_retryable() {
        assert!(!FetchError::Config("missing API_URL".into()).is_retryable());
    }

    #[test]
    fn test_runtime_errors_share_retry_policy() {
        assert!(FetchError::Transport("connection refused".into()).is_retryable());
        assert!(FetchError::EmptyBody.is_retryable());
        assert!(FetchError::Decode("expected array".into()).is_retryable());
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err = serde_json::from_str::<Vec<u32>>("{").unwrap_err();
        let fetch_err: FetchError = err.into();
        assert_eq!(fetch_err.kind(), "decode");
    }
}
