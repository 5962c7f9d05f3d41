//! Error types for FileWarden
//!
//! All errors are managed centrally.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// FileWarden error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Task / Agent
    // ========================================================================
    #[error("Task error: {0}")]
    Task(String),

    #[error("Agent error: {0}")]
    Agent(String),

    // ========================================================================
    // Request validation
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: cannot {operation} task {task} ({state})")]
    InvalidState {
        operation: String,
        task: String,
        state: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // External error conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Other
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error should be surfaced to the user as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::InvalidState { .. } | Error::InvalidArgument(_)
        )
    }

    /// InvalidState constructor helper
    pub fn invalid_state(
        operation: impl Into<String>,
        task: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Error::InvalidState {
            operation: operation.into(),
            task: task.into(),
            state: state.into(),
        }
    }
}

// ============================================================================
// From implementations (additional conversions)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
