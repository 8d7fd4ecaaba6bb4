//! Error types for the Quill core crate.

use thiserror::Error;

/// Top-level error type for all Quill operations.
#[derive(Debug, Error)]
pub enum QuillError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("Graph query error: {0}")]
    Graph(String),

    #[error("workbench API error: {0}")]
    Workbench(String),

    #[error("sync error: {0}")]
    Sync(String),
}

/// A convenience Result alias that defaults to [`QuillError`].
pub type Result<T> = std::result::Result<T, QuillError>;
