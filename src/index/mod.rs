//! Hierarchical time-range index
//!
//! Mirrors a source's directory tree: one [`IndexNode`] per directory, each
//! persisted to its own CSV file and holding the time span of every data
//! file below it.
//!
//! - **IndexNode**: load, incremental update, range search and write-out
//! - **IndexEntry**: one file, or one sub-directory owning a child node
//! - **codec**: the row format of persisted nodes
//! - **RangeQuery**: flattened, sortable query results
//! - **Indexer**: drives a full update pass with a worker pool
//!
//! # Architecture
//!
//! ```text
//! index_dir/dns.csv              /data/a.pcap, 2015 (directory row)
//!     │
//!     └── 2015/dns.csv           /data/2015/b.pcap, 05 (directory row)
//!             │
//!             └── 2015/05/dns.csv
//! ```
//!
//! A directory row carries the union of its subtree's spans, so a query
//! skips every subtree whose span misses the window.

pub mod codec;
mod driver;
mod entry;
mod error;
mod node;
mod query;

pub use codec::IndexRow;
pub use driver::{Indexer, Progress, UpdateContext, UpdateOptions, UpdateStats};
pub use entry::IndexEntry;
pub use error::{IndexError, IndexResult};
pub use node::IndexNode;
pub use query::{parse_time_bound, sort_matches, Match, RangeQuery, SortOrder};
