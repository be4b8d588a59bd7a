use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Closed failure classification surfaced to callers and end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Upstream,
    Timeout,
    UpstreamUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Validation(_) => ErrorKind::Validation,
            RelayError::Upstream(_) => ErrorKind::Upstream,
            RelayError::Timeout(_) => ErrorKind::Timeout,
            RelayError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            RelayError::Config(_) | RelayError::Storage(_) | RelayError::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Rebuild an error from a kind and message, as received over the wire.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Validation => RelayError::Validation(message),
            ErrorKind::Upstream | ErrorKind::Internal => RelayError::Upstream(message),
            ErrorKind::Timeout => RelayError::Timeout(message),
            ErrorKind::UpstreamUnavailable => RelayError::UpstreamUnavailable(message),
        }
    }

    /// Short human-readable message for the end user.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::Validation(msg) => msg.clone(),
            RelayError::Upstream(_) => {
                "The image provider failed to generate an image. Please try again later.".into()
            }
            RelayError::Timeout(_) => {
                "The image provider did not respond in time. Please try again.".into()
            }
            RelayError::UpstreamUnavailable(_) => {
                "The model list could not be loaded. Generation is unavailable.".into()
            }
            RelayError::Config(_) | RelayError::Storage(_) | RelayError::Serialization(_) => {
                "Internal error".into()
            }
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(RelayError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(RelayError::Timeout("x".into()).kind(), ErrorKind::Timeout);
        assert_eq!(RelayError::Storage("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_kind_round_trip() {
        let err = RelayError::from_kind(ErrorKind::UpstreamUnavailable, "down");
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(err.to_string(), "Upstream unavailable: down");
    }

    #[test]
    fn test_validation_message_is_user_facing() {
        let err = RelayError::Validation("Prompt cannot be empty".into());
        assert_eq!(err.user_message(), "Prompt cannot be empty");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::UpstreamUnavailable).unwrap();
        assert_eq!(json, "\"upstream_unavailable\"");
    }
}
