//! Index error types

use crate::config::ConfigError;
use crate::extract::ExtractError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while maintaining or querying an index
#[derive(Error, Debug)]
pub enum IndexError {
    /// Filesystem operation failed
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An extractor failed on a data file; aborts the update pass
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    /// Persisted index file could not be decoded
    #[error("Corrupt index {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// No extractor registered under the configured type
    #[error("Unknown data type: {0}")]
    UnknownFormat(String),

    /// Query window with begin after end
    #[error("Invalid time range: begin must not be after end")]
    InvalidTimeRange,

    /// Worker pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl IndexError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn decode(path: &Path, reason: impl Into<String>) -> Self {
        IndexError::Decode {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
