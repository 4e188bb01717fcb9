// src/error.rs
// =============================================================================
// Errors that cross the library boundary.
//
// Only a few conditions are real errors here:
// - A fetch failure, which ends the whole traversal
// - Starting a traversal twice (a caller bug)
// - Bad configuration
//
// Everything else (a refused push, a failed link extraction) is absorbed
// where it happens and only logged.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TraversalError {
    #[error("traversal was already started")]
    AlreadyStarted,

    #[error("failed to dereference {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TraversalError {
    // Keeps the full context chain of the collaborator's error
    pub fn fetch(url: impl Into<String>, error: &anyhow::Error) -> Self {
        TraversalError::Fetch {
            url: url.into(),
            message: format!("{:#}", error),
        }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, TraversalError::Fetch { .. })
    }
}

pub type Result<T, E = TraversalError> = std::result::Result<T, E>;
