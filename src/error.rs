//! Error types for the harvester library.
//!
//! Validation failures are routine and recovered inside the container;
//! harvest and persistence failures are surfaced to the caller.

use std::path::PathBuf;

use thiserror::Error;

/// A candidate item does not belong in a container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid title: expected \"{expected}\", got \"{found}\"")]
    TitleMismatch { expected: String, found: String },

    #[error("too few actions: needed more than {threshold}, got {found}")]
    TooFewActions { threshold: usize, found: usize },

    #[error("{field} can not be blank")]
    Blank { field: &'static str },

    #[error("{key} already exists")]
    Duplicate { key: String },
}

/// Failures talking to the remote service.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Connection-level failure that outlived the retry budget.
    #[error("request failed after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    /// Non-retryable HTTP status.
    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    /// Response body was not the JSON shape we expected.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Failures reading or writing a container's JSON file.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} does not contain valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} must contain a JSON array, found {found}", path.display())]
    NotAnArray { path: PathBuf, found: &'static str },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }
}
