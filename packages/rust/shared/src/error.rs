//! Error types for testsmith.
//!
//! Library crates use [`TestsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all testsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum TestsmithError {
    /// Configuration loading or validation error (including credentials).
    #[error("config error: {message}")]
    Config { message: String },

    /// The request never produced a readable HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The model provider answered, but not with something usable.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Malformed JSON from the provider or from a persisted index.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The instruction template file does not exist.
    #[error("prompt file not found: {path:?}")]
    PromptFileMissing { path: PathBuf },

    /// The contracts directory is missing or holds no readable documents.
    #[error("corpus at {path:?} is empty or unreadable: {reason}")]
    CorpusEmptyOrUnreadable { path: PathBuf, reason: String },

    /// Text could not be pulled out of a PDF.
    #[error("extraction error at {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// The persisted index is internally inconsistent.
    #[error("index error: {0}")]
    Index(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TestsmithError>;

impl TestsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create an API error for a given HTTP status.
    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a corpus error for the directory at `path`.
    pub fn corpus(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorpusEmptyOrUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an extraction error for the PDF at `path`.
    pub fn extraction(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: msg.into(),
        }
    }
}
