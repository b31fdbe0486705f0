//! Error taxonomy for the test-taking flow.
//!
//! Every failure a caller can observe while assembling, taking or scoring a
//! test is one of these variants. None of them is retried automatically; the
//! flow boundary turns them into a user-visible notification.

use thiserror::Error;

/// Errors raised by the psytest engine and its collaborators.
#[derive(Debug, Error)]
pub enum TestError {
    /// A referenced test, block, question or result does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The caller may not access the resource (foreign owner or plan gate).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed authored data or user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A block's pool cannot supply the requested number of questions.
    #[error(
        "insufficient questions in block '{block}': requested {requested}, available {available}"
    )]
    InsufficientQuestions {
        block: String,
        requested: usize,
        available: usize,
    },

    /// Submission refused because required questions are unanswered.
    #[error("{unanswered} question(s) left unanswered")]
    MissingAnswers { unanswered: usize },

    /// A collaborator call failed in transport.
    #[error("network error: {0}")]
    Network(String),

    /// The session was abandoned before the operation completed.
    #[error("operation cancelled")]
    Cancelled,

    /// An operation arrived in a phase that cannot accept it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TestError {
    /// Shorthand for [`TestError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        TestError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns `true` if the user should be sent back to a safe view
    /// (dashboard or login) after this error is shown.
    pub fn requires_redirect(&self) -> bool {
        matches!(self, TestError::NotFound { .. } | TestError::Unauthorized(_))
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, TestError>;
