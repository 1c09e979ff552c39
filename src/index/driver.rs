//! Update driver
//!
//! Runs one full update pass over a source: open the root node, update the
//! tree inside a bounded worker pool, then write out every changed node.

use super::error::{IndexError, IndexResult};
use super::node::IndexNode;
use crate::config::SourceConfig;
use crate::extract::{Extractor, ExtractorRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Options for an update pass
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Extract files and update sub-directories concurrently
    pub parallel: bool,
    /// Worker count; `None` uses one per CPU
    pub threads: Option<usize>,
    /// Log progress every this many extracted files (0 disables)
    pub progress_interval: usize,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
            progress_interval: 1000,
        }
    }
}

/// Counts extracted files and reports every `interval` of them
#[derive(Debug, Default)]
pub struct Progress {
    extracted: AtomicUsize,
    interval: usize,
}

impl Progress {
    pub fn new(interval: usize) -> Self {
        Self {
            extracted: AtomicUsize::new(0),
            interval,
        }
    }

    pub fn record(&self, path: &str) {
        let count = self.extracted.fetch_add(1, Ordering::Relaxed) + 1;
        if self.interval > 0 && count % self.interval == 0 {
            info!(files = count, last = %path, "Progress");
        }
    }

    pub fn count(&self) -> usize {
        self.extracted.load(Ordering::Relaxed)
    }
}

/// Everything an update pass needs besides the tree itself
pub struct UpdateContext<'a> {
    pub extractor: &'a dyn Extractor,
    pub parallel: bool,
    pub progress: Progress,
}

impl<'a> UpdateContext<'a> {
    pub fn new(extractor: &'a dyn Extractor, options: &UpdateOptions) -> Self {
        Self {
            extractor,
            parallel: options.parallel,
            progress: Progress::new(options.progress_interval),
        }
    }
}

/// Counters for one update pass, summed over the whole tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub files_extracted: usize,
    pub files_unchanged: usize,
    pub entries_removed: usize,
    pub directories: usize,
}

impl std::ops::AddAssign for UpdateStats {
    fn add_assign(&mut self, other: Self) {
        self.files_extracted += other.files_extracted;
        self.files_unchanged += other.files_unchanged;
        self.entries_removed += other.entries_removed;
        self.directories += other.directories;
    }
}

/// Drives update passes with a fixed extractor table and options
#[derive(Debug, Clone)]
pub struct Indexer {
    registry: ExtractorRegistry,
    options: UpdateOptions,
}

impl Indexer {
    /// Indexer over the built-in extractors
    pub fn new(options: UpdateOptions) -> Self {
        Self::with_registry(ExtractorRegistry::builtin().clone(), options)
    }

    pub fn with_registry(registry: ExtractorRegistry, options: UpdateOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &UpdateOptions {
        &self.options
    }

    fn extractor_for(&self, source: &SourceConfig) -> IndexResult<Arc<dyn Extractor>> {
        self.registry
            .get(&source.format)
            .ok_or_else(|| IndexError::UnknownFormat(source.format.clone()))
    }

    /// Update an already opened tree without writing it
    pub fn update(&self, root: &mut IndexNode) -> IndexResult<UpdateStats> {
        let extractor = self.extractor_for(root.source())?;
        let ctx = UpdateContext::new(extractor.as_ref(), &self.options);

        if !self.options.parallel {
            return root.update(&ctx);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads.unwrap_or(0))
            .build()
            .map_err(|e| IndexError::ThreadPool(e.to_string()))?;
        pool.install(|| root.update(&ctx))
    }

    /// Full pass: open, update and persist one source
    pub fn run(&self, source: &SourceConfig) -> IndexResult<UpdateStats> {
        // Fail before touching the filesystem
        self.extractor_for(source)?;

        let started = Instant::now();
        let mut root = IndexNode::open(Arc::new(source.clone()));
        let stats = self.update(&mut root)?;
        let written = root.write_out()?;

        info!(
            source = %source.name,
            extracted = stats.files_extracted,
            unchanged = stats.files_unchanged,
            removed = stats.entries_removed,
            directories = stats.directories,
            written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Index updated"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathFilter;
    use crate::extract::ExtractError;
    use crate::span::TimeSpan;
    use chrono::{TimeZone, Utc};
    use std::path::Path;
    use tempfile::tempdir;

    /// Always reports one fixed instant; fails on files named `missing*`
    /// as if they had been rotated away
    struct FixedExtractor;

    impl Extractor for FixedExtractor {
        fn name(&self) -> &str {
            "fixed"
        }

        fn extract(&self, path: &Path) -> Result<TimeSpan, ExtractError> {
            let name = path.file_name().unwrap().to_string_lossy();
            if name.starts_with("missing") {
                return Err(ExtractError::unreadable(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "rotated"),
                ));
            }
            Ok(TimeSpan::instant(Utc.timestamp_opt(1_000, 0).unwrap()))
        }
    }

    fn source(root: &Path) -> SourceConfig {
        SourceConfig::new("fx", root.join("index"), vec![root.join("data")], "fixed")
            .with_filter(PathFilter::any())
    }

    fn indexer(parallel: bool) -> Indexer {
        Indexer::with_registry(
            ExtractorRegistry::new().with(Arc::new(FixedExtractor)),
            UpdateOptions {
                parallel,
                threads: Some(2),
                progress_interval: 1,
            },
        )
    }

    #[test]
    fn test_run_persists_and_counts() {
        let tmp = tempdir().unwrap();
        let data = tmp.path().join("data");
        std::fs::create_dir_all(data.join("a/b")).unwrap();
        std::fs::write(data.join("one.log"), "x").unwrap();
        std::fs::write(data.join("a/two.log"), "x").unwrap();
        std::fs::write(data.join("a/b/three.log"), "x").unwrap();
        let source = source(tmp.path());

        for parallel in [true, false] {
            let _ = std::fs::remove_dir_all(tmp.path().join("index"));
            let stats = indexer(parallel).run(&source).unwrap();
            assert_eq!(stats.files_extracted, 3);
            assert_eq!(stats.directories, 3);
            assert!(source.index_file(Path::new("a/b")).is_file());
        }

        let again = indexer(true).run(&source).unwrap();
        assert_eq!(again.files_extracted, 0);
        assert_eq!(again.files_unchanged, 3);
    }

    #[test]
    fn test_rotated_file_is_skipped() {
        let tmp = tempdir().unwrap();
        let data = tmp.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("kept.log"), "x").unwrap();
        std::fs::write(data.join("missing.log"), "x").unwrap();

        let source = source(tmp.path());
        let stats = indexer(false).run(&source).unwrap();
        assert_eq!(stats.files_extracted, 1);

        let root = IndexNode::read(Arc::new(source), "").unwrap();
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn test_unknown_format() {
        let tmp = tempdir().unwrap();
        let mut source = source(tmp.path());
        source.format = "mrt".to_string();

        let err = indexer(false).run(&source).unwrap_err();
        assert!(matches!(err, IndexError::UnknownFormat(ref f) if f == "mrt"));
        assert!(!tmp.path().join("index").exists());
    }

    #[test]
    fn test_progress_counts() {
        let progress = Progress::new(2);
        progress.record("/a");
        progress.record("/b");
        progress.record("/c");
        assert_eq!(progress.count(), 3);
    }

    #[test]
    fn test_stats_add() {
        let mut total = UpdateStats {
            files_extracted: 1,
            directories: 1,
            ..Default::default()
        };
        total += UpdateStats {
            files_extracted: 2,
            files_unchanged: 3,
            entries_removed: 1,
            directories: 2,
        };
        assert_eq!(
            total,
            UpdateStats {
                files_extracted: 3,
                files_unchanged: 3,
                entries_removed: 1,
                directories: 3,
            }
        );
    }
}
