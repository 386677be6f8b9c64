//! Error types for the evaluation sweep.

use crate::index::IndexState;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while running an evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The dataset could not be loaded or is malformed.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration file error or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An index could not be brought to the ready state. Fatal for the run.
    #[error("Could not provision index '{index}': {reason}")]
    Provision { index: String, reason: String },

    /// An index could not be deleted.
    #[error("Could not tear down index '{index}': {reason}")]
    Teardown { index: String, reason: String },

    /// A bounded poll gave up before its condition became true.
    #[error("Gave up waiting for {what} after {attempts} attempts")]
    PollExhausted { what: String, attempts: u32 },

    /// An index handle was asked to move between two states that are not adjacent.
    #[error("Index '{index}' cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        index: String,
        from: IndexState,
        to: IndexState,
    },

    /// The QA backend or vector database rejected a request.
    #[error("Backend error: {0}")]
    Backend(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a provisioning error.
    pub fn provision(index: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Provision {
            index: index.into(),
            reason: reason.into(),
        }
    }

    /// Create a teardown error.
    pub fn teardown(index: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Teardown {
            index: index.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::Serialization(err.to_string())
    }
}
