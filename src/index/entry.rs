//! Index entries
//!
//! An entry is either a leaf (a data file, keyed by its absolute path) or a
//! directory (keyed by its bare name) that owns the child node indexing it.

use super::codec::IndexRow;
use super::node::IndexNode;
use crate::span::TimeSpan;
use chrono::{DateTime, Utc};
use std::path::Path;

#[derive(Debug)]
pub struct IndexEntry {
    /// Absolute path for files, bare name for sub-directories
    pub path: String,
    pub span: TimeSpan,
    /// Last observed modification time; `None` forces re-extraction
    pub modified: Option<DateTime<Utc>>,
    pub(crate) child: Option<Box<IndexNode>>,
}

impl IndexEntry {
    /// Leaf entry for a data file
    pub fn file(path: impl Into<String>, span: TimeSpan, modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            span,
            modified: Some(modified),
            child: None,
        }
    }

    /// Directory entry without a child node yet
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            path: name.into(),
            span: TimeSpan::unset(),
            modified: None,
            child: None,
        }
    }

    pub(crate) fn from_row(row: IndexRow) -> Self {
        Self {
            path: row.path,
            span: row.span,
            modified: row.modified,
            child: None,
        }
    }

    pub(crate) fn to_row(&self) -> IndexRow {
        IndexRow {
            path: self.path.clone(),
            span: self.span,
            modified: self.modified,
        }
    }

    /// Relative paths name sub-directories
    pub fn is_directory(&self) -> bool {
        !Path::new(&self.path).is_absolute()
    }

    /// A file is stale when never stamped or modified strictly after the
    /// recorded time. Equal times count as unchanged.
    pub fn is_stale(&self, mtime: DateTime<Utc>) -> bool {
        match self.modified {
            None => true,
            Some(recorded) => mtime > recorded,
        }
    }

    pub fn child(&self) -> Option<&IndexNode> {
        self.child.as_deref()
    }
}
