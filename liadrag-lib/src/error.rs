//! Error types for liadrag

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for liadrag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in liadrag operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid chunking or batching parameters, rejected before any work starts
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding or generation provider failed
    #[error("provider error: {0}")]
    Provider(String),

    /// A persisted index artifact is absent or unreadable
    #[error("missing index: {0}")]
    IndexMissing(String),

    /// The persisted index artifacts are malformed or disagree with each other
    #[error("corrupt index: {0}")]
    IndexCorrupt(String),

    /// An index build was attempted with no chunks
    #[error("empty corpus: {0}")]
    EmptyCorpus(String),

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem failure outside of index loading
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category reported to query-service callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Provider,
    IndexLoad,
    EmptyCorpus,
    InvalidInput,
    Io,
}

impl Error {
    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Provider(_) => ErrorKind::Provider,
            Error::IndexMissing(_) | Error::IndexCorrupt(_) => ErrorKind::IndexLoad,
            Error::EmptyCorpus(_) => ErrorKind::EmptyCorpus,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}
