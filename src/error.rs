use thiserror::Error;

const CONNECT_MESSAGE: &str = "Could not connect to the server. Please try again.";
const UNAUTHORIZED_MESSAGE: &str = "You are not authorized to perform this action.";

#[derive(Error, Debug)]
pub enum PerformanceError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not authorized (status {status}): {}", .message.as_deref().unwrap_or("no details"))]
    Authorization {
        status: u16,
        message: Option<String>,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unexpected response shape: {0}")]
    ShapeMismatch(String),

    #[error("Session token error: {0}")]
    Token(String),

    #[error("Invalid {kind} record: {details}")]
    InvalidRecord { kind: String, details: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Coarse classification used by callers deciding how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Authorization,
    Validation,
    ShapeMismatch,
    Other,
}

impl PerformanceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PerformanceError::Transport(_) => FailureKind::Transport,
            #[cfg(feature = "http")]
            PerformanceError::Http(_) => FailureKind::Transport,
            PerformanceError::Authorization { .. } | PerformanceError::Token(_) => {
                FailureKind::Authorization
            }
            PerformanceError::Validation(_) | PerformanceError::InvalidRecord { .. } => {
                FailureKind::Validation
            }
            PerformanceError::ShapeMismatch(_) => FailureKind::ShapeMismatch,
            PerformanceError::Config(_) | PerformanceError::SerializationError(_) => {
                FailureKind::Other
            }
        }
    }

    /// Text suitable for showing to the person who triggered a write.
    pub fn user_message(&self) -> String {
        match self {
            PerformanceError::Validation(message) => message.clone(),
            PerformanceError::InvalidRecord { details, .. } => details.clone(),
            other => match other.kind() {
                FailureKind::Authorization => UNAUTHORIZED_MESSAGE.to_string(),
                _ => CONNECT_MESSAGE.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PerformanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_by_kind() {
        let err = PerformanceError::Transport("connection refused".to_string());
        assert_eq!(err.user_message(), CONNECT_MESSAGE);

        let err = PerformanceError::Authorization {
            status: 403,
            message: Some("forbidden".to_string()),
        };
        assert_eq!(err.kind(), FailureKind::Authorization);
        assert_eq!(err.user_message(), UNAUTHORIZED_MESSAGE);

        let err = PerformanceError::Validation("clientName is required".to_string());
        assert_eq!(err.user_message(), "clientName is required");
    }

    #[test]
    fn test_shape_mismatch_is_reported_as_connection_problem() {
        let err = PerformanceError::ShapeMismatch("number".to_string());
        assert_eq!(err.kind(), FailureKind::ShapeMismatch);
        assert_eq!(err.user_message(), CONNECT_MESSAGE);
    }
}
