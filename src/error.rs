//! Error types for agent-handoff
//!
//! Defines the error enum covering every failure mode of the handoff core and
//! its collaborators. Uses thiserror for ergonomic error handling.

use crate::handoff::HandoffStatus;
use thiserror::Error;

/// Result type alias for handoff operations
pub type Result<T> = std::result::Result<T, HandoffError>;

/// Error type for handoff operations
#[derive(Error, Debug)]
pub enum HandoffError {
    /// No record exists with the given id
    #[error("No handoff record found with id '{0}'.")]
    NotFound(String),

    /// The requested transition is illegal from the record's current status
    #[error("Cannot {action} handoff in state '{status}'.")]
    InvalidTransition {
        action: &'static str,
        status: HandoffStatus,
    },

    /// Malformed request construction
    #[error("Validation error: {0}")]
    Validation(String),

    /// A snapshot could not be turned back into a record
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Routing-intelligence collaborator errors
    #[error("Routing error: {0}")]
    Routing(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Anyhow errors raised by observers and routing strategies
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl HandoffError {
    /// Shorthand for an illegal transition error
    pub fn invalid_transition(action: &'static str, status: HandoffStatus) -> Self {
        Self::InvalidTransition { action, status }
    }

    /// True for failures caused by a caller referencing an unknown record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for illegal state changes
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_embeds_status() {
        let err = HandoffError::invalid_transition("accept", HandoffStatus::Accepted);
        assert_eq!(err.to_string(), "Cannot accept handoff in state 'accepted'.");
        assert!(err.is_invalid_transition());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_message() {
        let err = HandoffError::NotFound("abc".to_string());
        assert!(err.to_string().contains("'abc'"));
        assert!(err.is_not_found());
    }
}
