//! Error types for sessions and backends

use screenplay_editor::EditorError;
use thiserror::Error;

/// Failure talking to the persistence backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Network or server trouble; worth another attempt
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    #[error("Malformed backend payload: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Malformed(e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("Session is closed")]
    Closed,
}
