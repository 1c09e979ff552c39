//! # timefind
//!
//! Persistent time-range index over archives of log files. Each indexed file
//! is summarised by the span of event timestamps it contains, so the files
//! relevant to an incident window can be found without re-reading them.
//!
//! ## Features
//!
//! - **Incremental updates**: only new or modified files are re-read
//! - **Hierarchical index**: one CSV file per directory, with subtree spans
//!   that let queries skip whole directories
//! - **Many formats**: pcap captures and a dozen appliance log formats, plain,
//!   gzipped or LZ4-framed
//! - **Crash safety**: index files are replaced by atomic rename
//!
//! ## Modules
//!
//! - [`span`]: time spans and their text encodings
//! - [`extract`]: per-format timestamp extractors
//! - [`index`]: the index tree, its persistence and range queries
//! - [`config`]: source configuration files
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use timefind::config::SourceConfig;
//! use timefind::index::{IndexNode, Indexer, RangeQuery, UpdateOptions};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = SourceConfig::load(Path::new("/etc/timefind/dns.conf.json"))?;
//!
//!     // Re-index new and modified files
//!     let stats = Indexer::new(UpdateOptions::default()).run(&source)?;
//!     println!("{} files extracted", stats.files_extracted);
//!
//!     // Find files covering a window
//!     let root = IndexNode::open(Arc::new(source));
//!     let begin = "2015-05-01T00:00:00Z".parse()?;
//!     let end = "2015-05-02T00:00:00Z".parse()?;
//!     for m in RangeQuery::new(begin, end)?.run(&root) {
//!         println!("{}", m.path);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod extract;
pub mod index;
pub mod logging;
pub mod span;

pub use config::{ConfigError, PathFilter, SourceConfig};
pub use extract::{ExtractError, Extractor, ExtractorRegistry};
pub use index::{IndexEntry, IndexError, IndexNode, IndexResult, Indexer, RangeQuery};
pub use span::{TimeSpan, TimestampFormat};
