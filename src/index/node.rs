//! Per-directory index nodes
//!
//! An [`IndexNode`] indexes one directory of a source: the same relative
//! sub-directory under every configured data root. Files are keyed by their
//! absolute path; sub-directories by their bare name, each owning the child
//! node for that sub-directory. Every node persists to its own CSV file at
//! `<index_dir>/<sub_dir>/<name>.csv`.

use super::codec::{self, IndexRow};
use super::driver::{UpdateContext, UpdateStats};
use super::entry::IndexEntry;
use super::error::{IndexError, IndexResult};
use crate::config::SourceConfig;
use crate::extract::ExtractError;
use crate::span::TimeSpan;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct IndexNode {
    source: Arc<SourceConfig>,
    /// Path of this directory relative to each data root
    sub_dir: PathBuf,
    /// Backing CSV file
    file: PathBuf,
    entries: HashMap<String, IndexEntry>,
    /// Union of every entry's span
    span: TimeSpan,
    /// Last pass that changed this node
    modified: Option<DateTime<Utc>>,
    /// Needs writing out
    dirty: bool,
}

/// A data file found while scanning a directory
struct Candidate {
    path: String,
    mtime: DateTime<Utc>,
}

impl IndexNode {
    /// An empty node with nothing persisted yet
    pub fn empty(source: Arc<SourceConfig>, sub_dir: impl Into<PathBuf>) -> Self {
        let sub_dir = sub_dir.into();
        let file = source.index_file(&sub_dir);
        Self {
            source,
            sub_dir,
            file,
            entries: HashMap::new(),
            span: TimeSpan::unset(),
            modified: None,
            dirty: true,
        }
    }

    /// Load the root node of a source, falling back to an empty node
    pub fn open(source: Arc<SourceConfig>) -> Self {
        Self::load(source, PathBuf::new())
    }

    /// Load a node, treating an unreadable or corrupt file as empty.
    ///
    /// The fallback node is dirty, so the next update re-extracts the whole
    /// subtree and overwrites the bad file.
    pub fn load(source: Arc<SourceConfig>, sub_dir: impl Into<PathBuf>) -> Self {
        let sub_dir = sub_dir.into();
        match Self::read(source.clone(), sub_dir.clone()) {
            Ok(node) => node,
            Err(e) => {
                warn!(sub_dir = ?sub_dir, error = %e, "Discarding unreadable index");
                Self::empty(source, sub_dir)
            }
        }
    }

    /// Load a node strictly; decode errors are returned.
    ///
    /// A missing file is not an error and yields an empty node. Directory
    /// rows load their child nodes leniently through [`IndexNode::load`].
    pub fn read(source: Arc<SourceConfig>, sub_dir: impl Into<PathBuf>) -> IndexResult<Self> {
        let mut node = Self::empty(source, sub_dir);

        let metadata = match fs::metadata(&node.file) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(node),
            Err(e) => return Err(IndexError::io(&node.file, e)),
        };
        node.modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        let mut repaired = false;
        for row in codec::read_file(&node.file)? {
            let mut entry = IndexEntry::from_row(row);

            if entry.is_directory() {
                let child_dir = node.sub_dir.join(&entry.path);
                if node.source.index_dir.join(&child_dir).is_dir() {
                    let mut child = Self::load(node.source.clone(), child_dir);
                    child.modified = entry.modified;
                    // The child's rows win over a stale or half-set directory row
                    if child.span != entry.span {
                        debug!(
                            path = %entry.path,
                            row = %entry.span,
                            child = %child.span,
                            "Directory span taken from child"
                        );
                        entry.span = child.span;
                        repaired = true;
                    }
                    entry.child = Some(Box::new(child));
                }
            }

            node.span.merge(&entry.span);
            node.entries.insert(entry.path.clone(), entry);
        }

        node.dirty = repaired;
        debug!(file = ?node.file, entries = node.entries.len(), "Loaded index");
        Ok(node)
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn sub_dir(&self) -> &Path {
        &self.sub_dir
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn span(&self) -> TimeSpan {
        self.span
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Add or replace an entry, widening the aggregate span
    pub fn insert(&mut self, entry: IndexEntry) {
        self.span.merge(&entry.span);
        self.entries.insert(entry.path.clone(), entry);
        self.dirty = true;
    }

    /// Attach a child node under a directory entry named after its last
    /// path component
    pub fn insert_child(&mut self, child: IndexNode) {
        let name = child
            .sub_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut entry = IndexEntry::directory(name);
        entry.span = child.span;
        entry.modified = child.modified;
        entry.child = Some(Box::new(child));
        self.insert(entry);
    }

    /// This directory under every data root, in configured order
    fn data_dirs(&self) -> Vec<PathBuf> {
        self.source
            .paths
            .iter()
            .map(|root| root.join(&self.sub_dir))
            .collect()
    }

    /// Bring this node and its subtree up to date with the filesystem.
    ///
    /// Vanished entries are pruned, new or modified files are extracted,
    /// sub-directories are updated recursively and the aggregate span is
    /// rebuilt. The first extraction failure aborts the pass.
    pub fn update(&mut self, ctx: &UpdateContext<'_>) -> IndexResult<UpdateStats> {
        let mut stats = UpdateStats {
            directories: 1,
            ..UpdateStats::default()
        };
        let data_dirs = self.data_dirs();

        let removed = self.prune(&data_dirs);
        stats.entries_removed += removed;
        let mut changed = removed > 0;

        let (candidates, sub_dirs) = self.scan(&data_dirs)?;

        let (stale, unchanged): (Vec<Candidate>, Vec<Candidate>) =
            candidates.into_iter().partition(|c| {
                self.entries
                    .get(&c.path)
                    .map_or(true, |entry| entry.is_stale(c.mtime))
            });
        stats.files_unchanged += unchanged.len();

        for (candidate, result) in self.extract_all(stale, ctx) {
            match result {
                Ok(span) => {
                    debug!(path = %candidate.path, %span, "Extracted");
                    self.entries.insert(
                        candidate.path.clone(),
                        IndexEntry::file(candidate.path, span, candidate.mtime),
                    );
                    stats.files_extracted += 1;
                    changed = true;
                }
                Err(e) if e.is_not_found() => {
                    warn!(path = %candidate.path, "File vanished before extraction");
                    if self.entries.remove(&candidate.path).is_some() {
                        stats.entries_removed += 1;
                        changed = true;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let (child_stats, children_changed) = self.update_children(sub_dirs, ctx)?;
        stats += child_stats;
        changed |= children_changed;

        self.span = self
            .entries
            .values()
            .fold(TimeSpan::unset(), |acc, entry| acc.union(&entry.span));

        if changed || self.dirty {
            self.modified = Some(Utc::now());
            self.dirty = true;
        }

        Ok(stats)
    }

    /// Drop entries whose path is no longer a regular file. Directory entries survive
    /// while the directory exists under some data root.
    fn prune(&mut self, data_dirs: &[PathBuf]) -> usize {
        let sub_dir = &self.sub_dir;
        let before = self.entries.len();

        self.entries.retain(|key, entry| {
            let present = if entry.is_directory() {
                data_dirs.iter().any(|dir| dir.join(key).is_dir())
            } else {
                fs::metadata(key).map(|m| m.is_file()).unwrap_or(false)
            };
            if !present {
                info!(path = %key, sub_dir = ?sub_dir, "Removing missing entry");
            }
            present
        });

        before - self.entries.len()
    }

    /// List matching files and sub-directory names across all data roots.
    ///
    /// Roots are visited in configured order and names within a directory in
    /// sorted order; the first root holding a file name wins.
    fn scan(&self, data_dirs: &[PathBuf]) -> IndexResult<(Vec<Candidate>, BTreeSet<String>)> {
        let mut candidates = Vec::new();
        let mut sub_dirs = BTreeSet::new();
        let mut seen = HashSet::new();

        for dir in data_dirs {
            let listing = match fs::read_dir(dir) {
                Ok(listing) => listing,
                Err(e) => {
                    debug!(dir = ?dir, error = %e, "Skipping unreadable data directory");
                    continue;
                }
            };

            let mut children = Vec::new();
            for child in listing {
                children.push(child.map_err(|e| IndexError::io(dir, e))?);
            }
            children.sort_by_key(|child| child.file_name());

            for child in children {
                let child_path = child.path();
                let Some(name) = child.file_name().to_str().map(str::to_owned) else {
                    warn!(path = ?child_path, "Skipping non UTF-8 file name");
                    continue;
                };

                let file_type = match child.file_type() {
                    Ok(file_type) => file_type,
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(IndexError::io(&child_path, e)),
                };
                if file_type.is_dir() {
                    sub_dirs.insert(name);
                    continue;
                }

                if !self.source.filter.matches(&name) {
                    continue;
                }
                if !seen.insert(name) {
                    debug!(path = ?child_path, "Shadowed by an earlier data root");
                    continue;
                }

                let metadata = match fs::metadata(&child_path) {
                    Ok(metadata) => metadata,
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(IndexError::io(&child_path, e)),
                };
                if !metadata.is_file() {
                    continue;
                }
                let mtime = metadata
                    .modified()
                    .map_err(|e| IndexError::io(&child_path, e))?;

                let Some(path) = child_path.to_str().map(str::to_owned) else {
                    warn!(path = ?child_path, "Skipping non UTF-8 path");
                    continue;
                };
                candidates.push(Candidate {
                    path,
                    mtime: DateTime::<Utc>::from(mtime),
                });
            }
        }

        Ok((candidates, sub_dirs))
    }

    /// Run the extractor over stale files, in parallel when enabled
    fn extract_all(
        &self,
        stale: Vec<Candidate>,
        ctx: &UpdateContext<'_>,
    ) -> Vec<(Candidate, Result<TimeSpan, ExtractError>)> {
        let extract = |candidate: Candidate| {
            debug!(path = %candidate.path, "Processing data file");
            let result = ctx.extractor.extract(Path::new(&candidate.path));
            ctx.progress.record(&candidate.path);
            (candidate, result)
        };

        if ctx.parallel {
            stale.into_par_iter().map(extract).collect()
        } else {
            stale.into_iter().map(extract).collect()
        }
    }

    /// Update every sub-directory node and fold the results back into
    /// their directory entries. Returns whether any directory entry changed.
    fn update_children(
        &mut self,
        sub_dirs: BTreeSet<String>,
        ctx: &UpdateContext<'_>,
    ) -> IndexResult<(UpdateStats, bool)> {
        let mut changed = false;
        let mut pending = Vec::with_capacity(sub_dirs.len());

        for name in sub_dirs {
            let mut entry = match self.entries.remove(&name) {
                Some(entry) => entry,
                None => {
                    changed = true;
                    IndexEntry::directory(name.clone())
                }
            };
            if entry.child.is_none() {
                let child = Self::load(self.source.clone(), self.sub_dir.join(&name));
                entry.child = Some(Box::new(child));
            }
            pending.push(entry);
        }

        let update_one = |entry: &mut IndexEntry| -> IndexResult<UpdateStats> {
            match entry.child.as_deref_mut() {
                Some(child) => {
                    debug!(sub_dir = ?child.sub_dir, "Processing subdirectory");
                    child.update(ctx)
                }
                None => Ok(UpdateStats::default()),
            }
        };

        let results: Vec<IndexResult<UpdateStats>> = if ctx.parallel {
            pending.par_iter_mut().map(update_one).collect()
        } else {
            pending.iter_mut().map(update_one).collect()
        };

        for entry in &mut pending {
            if let Some(child) = entry.child.as_deref() {
                changed |= child.dirty;
                entry.span = child.span;
                entry.modified = child.modified;
            }
        }
        for entry in pending {
            self.entries.insert(entry.path.clone(), entry);
        }

        let mut stats = UpdateStats::default();
        for result in results {
            stats += result?;
        }
        Ok((stats, changed))
    }

    /// Leaf entries whose span overlaps the inclusive window `[begin, end]`.
    ///
    /// Directories whose aggregate span misses the window are not descended.
    /// Order is unspecified. An inverted window matches nothing.
    pub fn find_in_range(&self, begin: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&IndexEntry> {
        let mut found = Vec::new();
        if begin > end {
            return found;
        }
        self.collect_in_range(begin, end, &mut found);
        found
    }

    fn collect_in_range<'a>(
        &'a self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        found: &mut Vec<&'a IndexEntry>,
    ) {
        for entry in self.entries.values() {
            if !entry.span.overlaps(begin, end) {
                continue;
            }
            match entry.child.as_deref() {
                Some(child) => child.collect_in_range(begin, end, found),
                None if entry.is_directory() => {}
                None => found.push(entry),
            }
        }
    }

    /// Persist every dirty node in this subtree, children before parents.
    ///
    /// Returns the number of index files written.
    pub fn write_out(&mut self) -> IndexResult<usize> {
        let mut written = 0;
        for entry in self.entries.values_mut() {
            if let Some(child) = entry.child.as_deref_mut() {
                written += child.write_out()?;
            }
        }

        if !self.dirty {
            return Ok(written);
        }

        let mut rows: Vec<IndexRow> = self.entries.values().map(IndexEntry::to_row).collect();
        codec::write_file(&self.file, &mut rows, self.source.timestamp_format)?;
        self.dirty = false;
        debug!(file = ?self.file, rows = rows.len(), "Index written");

        Ok(written + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathFilter;
    use crate::extract::Extractor;
    use crate::index::UpdateOptions;
    use crate::span::TimestampFormat;
    use chrono::TimeZone;
    use std::fs::File;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};
    use tempfile::{tempdir, TempDir};

    /// Reads the first line of a file as `<earliest> <latest>` unix seconds
    /// and counts every call
    #[derive(Default)]
    struct CountingExtractor {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl CountingExtractor {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Extractor for CountingExtractor {
        fn name(&self) -> &str {
            "counting"
        }

        fn extract(&self, path: &Path) -> Result<TimeSpan, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push(path.file_name().unwrap().to_string_lossy().into_owned());

            let text = fs::read_to_string(path).map_err(|e| ExtractError::unreadable(path, e))?;
            let mut fields = text.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(e), Some(l)) => {
                    let e: i64 = e.parse().map_err(|_| ExtractError::unrecognized(path, "e"))?;
                    let l: i64 = l.parse().map_err(|_| ExtractError::unrecognized(path, "l"))?;
                    Ok(TimeSpan::new(at(e), at(l)))
                }
                _ => Ok(TimeSpan::unset()),
            }
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    struct Fixture {
        _tmp: TempDir,
        data: PathBuf,
        source: Arc<SourceConfig>,
    }

    fn fixture() -> Fixture {
        let tmp = tempdir().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir_all(&data).unwrap();
        let source = SourceConfig::new(
            "test",
            tmp.path().join("index"),
            vec![data.clone()],
            "counting",
        )
        .with_filter(PathFilter::new(&["*.log"], &[]).unwrap());
        Fixture {
            _tmp: tmp,
            data,
            source: Arc::new(source),
        }
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn ctx<'a>(extractor: &'a CountingExtractor, parallel: bool) -> UpdateContext<'a> {
        UpdateContext::new(
            extractor,
            &UpdateOptions {
                parallel,
                ..UpdateOptions::default()
            },
        )
    }

    fn pass(source: &Arc<SourceConfig>, extractor: &CountingExtractor) -> IndexNode {
        let mut root = IndexNode::open(source.clone());
        root.update(&ctx(extractor, false)).unwrap();
        root.write_out().unwrap();
        root
    }

    fn sorted_paths(entries: Vec<&IndexEntry>) -> Vec<String> {
        let mut paths: Vec<String> = entries.into_iter().map(|e| e.path.clone()).collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_update_builds_tree() {
        let fx = fixture();
        write(&fx.data.join("a.log"), "10 20");
        write(&fx.data.join("skip.txt"), "1 2");
        write(&fx.data.join("2015/b.log"), "25 30");
        write(&fx.data.join("2015/05/c.log"), "5 12");

        let extractor = CountingExtractor::default();
        let mut root = IndexNode::open(fx.source.clone());
        let stats = root.update(&ctx(&extractor, false)).unwrap();

        assert_eq!(stats.files_extracted, 3);
        assert_eq!(stats.directories, 3);
        assert_eq!(root.span(), TimeSpan::new(at(5), at(30)));
        assert!(root.get("2015").unwrap().is_directory());
        assert_eq!(root.get("2015").unwrap().span, TimeSpan::new(at(5), at(30)));
        assert!(root
            .get(fx.data.join("skip.txt").to_str().unwrap())
            .is_none());

        assert_eq!(root.write_out().unwrap(), 3);
        assert!(fx.source.index_file(Path::new("2015/05")).is_file());
    }

    #[test]
    fn test_range_overlap() {
        let fx = fixture();
        let mut root = IndexNode::empty(fx.source.clone(), "");
        let t = at(0);
        root.insert(IndexEntry::file("/d/first.log", TimeSpan::new(at(10), at(20)), t));
        root.insert(IndexEntry::file("/d/second.log", TimeSpan::new(at(25), at(30)), t));
        root.insert(IndexEntry::file("/d/third.log", TimeSpan::new(at(5), at(12)), t));
        root.insert(IndexEntry::file("/d/empty.log", TimeSpan::unset(), t));

        assert_eq!(
            sorted_paths(root.find_in_range(at(11), at(19))),
            vec!["/d/first.log", "/d/third.log"]
        );
        assert!(root.find_in_range(at(21), at(24)).is_empty());
        assert!(root.find_in_range(at(19), at(11)).is_empty());
    }

    #[test]
    fn test_range_descends_only_matching_directories() {
        let fx = fixture();
        let t = at(0);

        let mut child = IndexNode::empty(fx.source.clone(), "2015");
        child.insert(IndexEntry::file("/d/2015/x.log", TimeSpan::new(at(100), at(200)), t));

        let mut root = IndexNode::empty(fx.source.clone(), "");
        root.insert_child(child);
        root.insert(IndexEntry::file("/d/y.log", TimeSpan::new(at(10), at(20)), t));
        root.insert(IndexEntry::directory("orphan"));

        assert_eq!(sorted_paths(root.find_in_range(at(150), at(150))), vec!["/d/2015/x.log"]);
        assert_eq!(
            sorted_paths(root.find_in_range(at(0), at(1000))),
            vec!["/d/2015/x.log", "/d/y.log"]
        );
    }

    #[test]
    fn test_idempotent_update() {
        let fx = fixture();
        write(&fx.data.join("a.log"), "10 20");
        write(&fx.data.join("sub/b.log"), "30 40");

        let extractor = CountingExtractor::default();
        pass(&fx.source, &extractor);
        let root_file = fx.source.index_file(Path::new(""));
        let sub_file = fx.source.index_file(Path::new("sub"));
        let first = (fs::read(&root_file).unwrap(), fs::read(&sub_file).unwrap());

        let second_root = pass(&fx.source, &extractor);
        let second = (fs::read(&root_file).unwrap(), fs::read(&sub_file).unwrap());

        assert_eq!(first, second);
        assert!(!second_root.is_dirty());
    }

    #[test]
    fn test_unchanged_files_not_reextracted() {
        let fx = fixture();
        write(&fx.data.join("a.log"), "10 20");
        write(&fx.data.join("deep/er/b.log"), "30 40");

        let extractor = CountingExtractor::default();
        pass(&fx.source, &extractor);
        assert_eq!(extractor.calls(), 2);

        // Same process, same tree
        let mut root = IndexNode::open(fx.source.clone());
        let stats = root.update(&ctx(&extractor, false)).unwrap();
        root.update(&ctx(&extractor, false)).unwrap();
        assert_eq!(extractor.calls(), 2);
        assert_eq!(stats.files_unchanged, 2);
        assert_eq!(stats.files_extracted, 0);
    }

    #[test]
    fn test_mtime_tie_unchanged_newer_reextracted() {
        let fx = fixture();
        let file = fx.data.join("a.log");
        write(&file, "10 20");
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        set_mtime(&file, base);

        let extractor = CountingExtractor::default();
        pass(&fx.source, &extractor);
        assert_eq!(extractor.calls(), 1);

        // Rewritten content, mtime restored: treated as unchanged
        write(&file, "50 60");
        set_mtime(&file, base);
        let root = pass(&fx.source, &extractor);
        assert_eq!(extractor.calls(), 1);
        assert_eq!(root.span(), TimeSpan::new(at(10), at(20)));

        set_mtime(&file, base + Duration::from_secs(1));
        let root = pass(&fx.source, &extractor);
        assert_eq!(extractor.calls(), 2);
        assert_eq!(root.span(), TimeSpan::new(at(50), at(60)));

        // Older mtime is not stale either
        set_mtime(&file, base);
        pass(&fx.source, &extractor);
        assert_eq!(extractor.calls(), 2);
    }

    #[test]
    fn test_vanished_file_pruned() {
        let fx = fixture();
        let keep = fx.data.join("keep.log");
        let gone = fx.data.join("gone.log");
        write(&keep, "10 20");
        write(&gone, "30 40");
        write(&fx.data.join("olddir/c.log"), "50 60");

        let extractor = CountingExtractor::default();
        pass(&fx.source, &extractor);

        fs::remove_file(&gone).unwrap();
        fs::remove_dir_all(fx.data.join("olddir")).unwrap();

        let mut root = IndexNode::open(fx.source.clone());
        let stats = root.update(&ctx(&extractor, false)).unwrap();
        root.write_out().unwrap();

        assert_eq!(stats.entries_removed, 2);
        assert!(root.get(gone.to_str().unwrap()).is_none());
        assert!(root.get("olddir").is_none());
        assert_eq!(root.span(), TimeSpan::new(at(10), at(20)));

        let persisted = fs::read_to_string(fx.source.index_file(Path::new(""))).unwrap();
        assert!(!persisted.contains("gone.log"));
        assert!(!persisted.contains("olddir"));
        assert!(persisted.contains("keep.log"));
    }

    #[test]
    fn test_file_replaced_by_directory_pruned() {
        let fx = fixture();
        let file = fx.data.join("a.log");
        write(&file, "10 20");
        let extractor = CountingExtractor::default();
        pass(&fx.source, &extractor);

        fs::remove_file(&file).unwrap();
        fs::create_dir(&file).unwrap();

        let root = pass(&fx.source, &extractor);
        assert!(root.get(file.to_str().unwrap()).is_none());
        assert!(root.find_in_range(at(0), at(100)).is_empty());
    }

    #[test]
    fn test_legacy_rows_reextracted() {
        let fx = fixture();
        let file = fx.data.join("a.log");
        write(&file, "10 20");

        let index_file = fx.source.index_file(Path::new(""));
        write(
            &index_file,
            &format!("{},1970-01-01T00:00:01Z,1970-01-01T00:00:02Z\n", file.display()),
        );

        let root = IndexNode::read(fx.source.clone(), "").unwrap();
        let entry = root.get(file.to_str().unwrap()).unwrap();
        assert_eq!(entry.modified, None);
        assert_eq!(entry.span, TimeSpan::new(at(1), at(2)));

        let extractor = CountingExtractor::default();
        let root = pass(&fx.source, &extractor);
        assert_eq!(extractor.calls(), 1);
        let entry = root.get(file.to_str().unwrap()).unwrap();
        assert_eq!(entry.span, TimeSpan::new(at(10), at(20)));
        assert!(entry.modified.is_some());

        let rows = codec::read_file(&index_file).unwrap();
        assert!(rows[0].modified.is_some());
    }

    #[test]
    fn test_half_set_directory_row_keeps_child_rows() {
        let fx = fixture();
        let leaf = fx.data.join("2015/a.log");
        write(&leaf, "10 20");

        write(
            &fx.source.index_file(Path::new("")),
            "2015,-62135596800.000000000,20.000000000,30.000000000\n",
        );
        write(
            &fx.source.index_file(Path::new("2015")),
            &format!(
                "{},-62135596800.000000000,-62135596800.000000000,40.000000000\n\
                 {},10.000000000,20.000000000,30.000000000\n",
                fx.data.join("2015/empty.log").display(),
                leaf.display()
            ),
        );

        let root = IndexNode::read(fx.source.clone(), "").unwrap();
        assert!(root.is_dirty());
        let dir = root.get("2015").unwrap();
        assert_eq!(dir.span, TimeSpan::new(at(10), at(20)));
        assert_eq!(dir.child().unwrap().len(), 2);
        assert_eq!(
            sorted_paths(root.find_in_range(at(12), at(14))),
            vec![leaf.display().to_string()]
        );
    }

    #[test]
    fn test_corrupt_index_loads_empty() {
        let fx = fixture();
        let index_file = fx.source.index_file(Path::new(""));
        write(&index_file, "/d/a.log,not-a-time,20,30\n");

        assert!(matches!(
            IndexNode::read(fx.source.clone(), ""),
            Err(IndexError::Decode { .. })
        ));

        let node = IndexNode::load(fx.source.clone(), "");
        assert!(node.is_empty());
        assert!(node.is_dirty());

        write(&fx.data.join("a.log"), "10 20");
        let extractor = CountingExtractor::default();
        let root = pass(&fx.source, &extractor);
        assert_eq!(root.len(), 1);
        assert_eq!(codec::read_file(&index_file).unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_child_does_not_spoil_parent() {
        let fx = fixture();
        write(&fx.data.join("a.log"), "10 20");
        write(&fx.data.join("sub/b.log"), "30 40");
        let extractor = CountingExtractor::default();
        pass(&fx.source, &extractor);

        write(&fx.source.index_file(Path::new("sub")), "garbage\n");
        let root = IndexNode::read(fx.source.clone(), "").unwrap();
        let child = root.get("sub").unwrap().child().unwrap();
        assert!(child.is_empty());
        assert!(child.is_dirty());

        pass(&fx.source, &extractor);
        assert_eq!(extractor.calls(), 3);
    }

    #[test]
    fn test_extraction_error_aborts_pass() {
        let fx = fixture();
        write(&fx.data.join("a.log"), "10 20");
        write(&fx.data.join("bad.log"), "ten twenty");

        let extractor = CountingExtractor::default();
        let mut root = IndexNode::open(fx.source.clone());
        let err = root.update(&ctx(&extractor, false)).unwrap_err();
        assert!(matches!(err, IndexError::Extraction(_)));
        assert!(!fx.source.index_file(Path::new("")).exists());
    }

    #[test]
    fn test_overlay_roots_first_wins() {
        let tmp = tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        write(&first.join("a.log"), "10 20");
        write(&second.join("a.log"), "90 99");
        write(&second.join("b.log"), "30 40");
        write(&first.join("shared/x.log"), "1 2");
        write(&second.join("shared/y.log"), "3 4");

        let source = Arc::new(
            SourceConfig::new("o", tmp.path().join("idx"), vec![first.clone(), second], "c")
                .with_filter(PathFilter::any()),
        );
        let extractor = CountingExtractor::default();
        let mut root = IndexNode::open(source);
        root.update(&ctx(&extractor, false)).unwrap();

        assert_eq!(extractor.calls(), 4);
        assert!(root.get(first.join("a.log").to_str().unwrap()).is_some());
        assert_eq!(root.span(), TimeSpan::new(at(1), at(40)));
        let shared = root.get("shared").unwrap().child().unwrap();
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let fx = fixture();
        for i in 0..20 {
            write(&fx.data.join(format!("d{}/f{i}.log", i % 4)), &format!("{i} {}", i + 5));
        }

        let seq = CountingExtractor::default();
        let mut a = IndexNode::empty(fx.source.clone(), "");
        a.update(&ctx(&seq, false)).unwrap();

        let par = CountingExtractor::default();
        let mut b = IndexNode::empty(fx.source.clone(), "");
        b.update(&ctx(&par, true)).unwrap();

        assert_eq!(seq.calls(), 20);
        assert_eq!(par.calls(), 20);
        assert_eq!(a.span(), b.span());
        assert_eq!(
            sorted_paths(a.find_in_range(at(0), at(100))),
            sorted_paths(b.find_in_range(at(0), at(100)))
        );
    }

    #[test]
    fn test_child_modified_round_trips_through_parent_row() {
        let fx = fixture();
        write(&fx.data.join("sub/b.log"), "30 40");
        let extractor = CountingExtractor::default();
        let first = pass(&fx.source, &extractor);
        let modified = first.get("sub").unwrap().child().unwrap().modified();
        assert!(modified.is_some());

        let reloaded = IndexNode::read(fx.source.clone(), "").unwrap();
        assert_eq!(reloaded.get("sub").unwrap().child().unwrap().modified(), modified);
    }

    #[test]
    fn test_rfc3339_index_format() {
        let tmp = tempdir().unwrap();
        let data = tmp.path().join("data");
        write(&data.join("a.log"), "10 20");
        let source = Arc::new(
            SourceConfig::new("r", tmp.path().join("idx"), vec![data], "c")
                .with_filter(PathFilter::any())
                .with_timestamp_format(TimestampFormat::Rfc3339),
        );

        let extractor = CountingExtractor::default();
        pass(&source, &extractor);
        let text = fs::read_to_string(source.index_file(Path::new(""))).unwrap();
        assert!(text.contains("1970-01-01T00:00:10Z,1970-01-01T00:00:20Z"));
    }
}
