//! Error types for engram.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for engram operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Workspace root missing or not a directory.
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Version-control log provider could not be invoked.
    #[error("Git unavailable: {0}")]
    GitUnavailable(String),

    /// Remote store round trip failed.
    #[error("Store error: {0}")]
    Store(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] Box<ureq::Error>),

    /// Enrichment service returned an unusable reply.
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid date/time.
    #[error("Invalid date/time: {0}")]
    Chrono(#[from] chrono::ParseError),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Error::Http(Box::new(err))
    }
}
