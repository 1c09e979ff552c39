//! Timestamp extractors
//!
//! An extractor opens one (possibly compressed) data file and reports the
//! span of event timestamps it contains. Extractors are registered by format
//! name; a source configuration selects one with its `type` key.
//!
//! - **transport**: picks a decompression stream from the file's magic bytes
//! - **lines**: regex-driven extractors for line-oriented text logs
//! - **pcap**: classic libpcap capture files
//! - **mrt**: MRT routing dumps
//!
//! # Contract
//!
//! - Empty files, or files without a single recognisable timestamp, yield an
//!   unset span and no error.
//! - Extraction is a pure function of file content: the index relies on this
//!   to skip files whose modification time has not moved.
//! - File handles and decoders are dropped on every return path.

mod lines;
mod mrt;
mod pcap;
mod transport;

pub use lines::{LineExtractor, LineFormat, TimeLayout};
pub use mrt::MrtExtractor;
pub use pcap::PcapExtractor;
pub use transport::{open_stream, Compression};

use crate::span::TimeSpan;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Format-specific timestamp extraction
pub trait Extractor: Send + Sync {
    /// Format name this extractor is registered under
    fn name(&self) -> &str;

    /// Scan a file and return the span of its event timestamps
    fn extract(&self, path: &Path) -> Result<TimeSpan, ExtractError>;
}

/// Errors that can occur while extracting timestamps
#[derive(Error, Debug)]
pub enum ExtractError {
    /// File could not be opened or read
    #[error("cannot read {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content does not match the configured format
    #[error("unrecognized format in {path:?}: {detail}")]
    UnrecognizedFormat { path: PathBuf, detail: String },

    /// File ended in the middle of a record
    #[error("truncated file {path:?}: {detail}")]
    Truncated { path: PathBuf, detail: String },
}

impl ExtractError {
    pub fn unreadable(path: &Path, source: std::io::Error) -> Self {
        ExtractError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn unrecognized(path: &Path, detail: impl Into<String>) -> Self {
        ExtractError::UnrecognizedFormat {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }

    pub fn truncated(path: &Path, detail: impl Into<String>) -> Self {
        ExtractError::Truncated {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }

    /// Map an I/O error raised mid-stream (usually by a decoder)
    pub(crate) fn from_stream(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::truncated(path, err.to_string()),
            std::io::ErrorKind::InvalidData => Self::unrecognized(path, err.to_string()),
            _ => Self::unreadable(path, err),
        }
    }

    /// True when the file vanished (rotated or deleted) before it could be read
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ExtractError::Unreadable { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }

    pub fn path(&self) -> &Path {
        match self {
            ExtractError::Unreadable { path, .. }
            | ExtractError::UnrecognizedFormat { path, .. }
            | ExtractError::Truncated { path, .. } => path,
        }
    }
}

/// Name-keyed table of extractors
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in formats, constructed once per process
    pub fn builtin() -> &'static ExtractorRegistry {
        static BUILTIN: OnceLock<ExtractorRegistry> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            let mut registry = ExtractorRegistry::new();
            for format in LineFormat::builtin() {
                registry.register(Arc::new(LineExtractor::new(format)));
            }
            registry.register(Arc::new(MrtExtractor));
            registry.register(Arc::new(PcapExtractor));
            registry
        })
    }

    /// Register an extractor under its own name, replacing any previous one
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors
            .insert(extractor.name().to_string(), extractor);
    }

    /// Builder: register an extractor
    pub fn with(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.register(extractor);
        self
    }

    /// Look up an extractor by format name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extractors.contains_key(name)
    }

    /// Registered format names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("formats", &self.names())
            .finish()
    }
}
