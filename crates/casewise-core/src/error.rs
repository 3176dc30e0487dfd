//! Error types shared by every CaseWise crate.

use crate::flow::FlowState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The error taxonomy of the diagnostic session engine.
///
/// Variants carry structured fields so callers can branch on them without
/// parsing messages. Conversions from common library errors are provided via
/// `From`.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CasewiseError {
    /// No session is stored under the given id.
    #[error("Session not found: '{session_id}'")]
    SessionNotFound { session_id: String },

    /// A session with the given id is already stored.
    #[error("Session already exists: '{session_id}'")]
    SessionExists { session_id: String },

    /// The requested action is not valid from the machine's current state.
    #[error("Invalid state transition: cannot '{action}' from state '{current_state}'")]
    InvalidStateTransition {
        current_state: FlowState,
        action: String,
    },

    /// A provider (case, question, grading, teaching) failed.
    #[error("Agent '{agent}' failed: {message}")]
    AgentExecution { agent: String, message: String },

    /// The case id is unknown to the case provider.
    #[error("Case not found: '{case_id}'")]
    CaseNotFound { case_id: String },

    /// A stale write lost an optimistic-concurrency race. Retryable.
    #[error("Version conflict on session '{session_id}': expected {expected}, found {actual}")]
    VersionConflict {
        session_id: String,
        expected: u64,
        actual: u64,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CasewiseError {
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    pub fn invalid_transition(current_state: FlowState, action: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            current_state,
            action: action.into(),
        }
    }

    pub fn agent(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AgentExecution {
            agent: agent.into(),
            message: message.into(),
        }
    }

    pub fn case_not_found(case_id: impl Into<String>) -> Self {
        Self::CaseNotFound {
            case_id: case_id.into(),
        }
    }

    pub fn version_conflict(session_id: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::VersionConflict {
            session_id: session_id.into(),
            expected,
            actual,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_session_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidStateTransition { .. })
    }

    pub fn is_case_not_found(&self) -> bool {
        matches!(self, Self::CaseNotFound { .. })
    }

    pub fn is_agent_execution(&self) -> bool {
        matches!(self, Self::AgentExecution { .. })
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Only optimistic-concurrency conflicts qualify: the caller re-reads the
    /// session and retries.
    pub fn is_retryable(&self) -> bool {
        self.is_version_conflict()
    }
}

impl From<std::io::Error> for CasewiseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for CasewiseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for CasewiseError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for CasewiseError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, CasewiseError>`.
pub type Result<T> = std::result::Result<T, CasewiseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_names_state_and_action() {
        let err = CasewiseError::invalid_transition(FlowState::Initialized, "submit_answer");
        let message = err.to_string();
        assert!(message.contains("submit_answer"));
        assert!(message.contains("initialized"));
        assert!(err.is_invalid_transition());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_version_conflict_is_retryable() {
        let err = CasewiseError::version_conflict("s-1", 3, 4);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("expected 3"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CasewiseError = io.into();
        assert!(matches!(err, CasewiseError::Io { .. }));
    }
}
