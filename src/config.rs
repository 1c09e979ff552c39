//! Configuration System
//!
//! One configuration file describes one data source: where its files live,
//! which file names are indexed, which extractor reads them and where the
//! index is stored. Two file syntaxes share one model:
//!
//! - JSON (`dns.conf.json`), keys `indexDir`, `paths`, `include`, `exclude`,
//!   `type` (PascalCase spellings such as `IndexDir` are accepted too)
//! - TOML (`dns.toml`), keys in snake_case
//!
//! The source name is the file's base name up to the first `.`.

use crate::span::TimestampFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// On-disk shape shared by the JSON and TOML syntaxes
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceFile {
    #[serde(default, alias = "IndexDir", alias = "index_dir")]
    index_dir: Option<String>,

    #[serde(default, alias = "Paths")]
    paths: Vec<String>,

    #[serde(default, alias = "Include")]
    include: Vec<String>,

    #[serde(default, alias = "Exclude")]
    exclude: Vec<String>,

    #[serde(rename = "type", alias = "Type")]
    format: String,

    #[serde(default, alias = "TimestampFormat", alias = "timestamp_format")]
    timestamp_format: TimestampFormat,
}

fn default_index_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("timefind"))
        .unwrap_or_else(|| PathBuf::from("./timefind_index"))
}

/// Include/exclude file name filter
///
/// Patterns are matched against the bare file name. Exclusion wins over
/// inclusion, and a filter without include patterns matches nothing.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// A filter accepting every file name
    pub fn any() -> Self {
        Self {
            include: glob::Pattern::new("*").into_iter().collect(),
            exclude: Vec::new(),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(file_name)) {
            return false;
        }
        self.include.iter().any(|p| p.matches(file_name))
    }

    pub fn has_include(&self) -> bool {
        !self.include.is_empty()
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<glob::Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p.as_ref()).map_err(|e| ConfigError::Pattern {
                pattern: p.as_ref().to_string(),
                error: e.to_string(),
            })
        })
        .collect()
}

/// Validated configuration of one data source
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Logical section name; names the persisted index files
    pub name: String,
    /// Root under which index files are stored
    pub index_dir: PathBuf,
    /// Overlay roots holding the data files, searched in order
    pub paths: Vec<PathBuf>,
    pub filter: PathFilter,
    /// Extractor name
    pub format: String,
    pub timestamp_format: TimestampFormat,
}

impl SourceConfig {
    /// Build a configuration programmatically. The filter starts empty.
    pub fn new(
        name: impl Into<String>,
        index_dir: impl Into<PathBuf>,
        paths: Vec<PathBuf>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            index_dir: index_dir.into(),
            paths,
            filter: PathFilter::default(),
            format: format.into(),
            timestamp_format: TimestampFormat::default(),
        }
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Load a source configuration file (JSON, or TOML for `.toml`)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let file: SourceFile = if is_toml {
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?
        };

        let mut config = Self::from_file(source_name(path), file)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse JSON configuration text under an explicit source name
    pub fn from_json(name: &str, content: &str) -> Result<Self, ConfigError> {
        let file: SourceFile = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from(name),
            error: e.to_string(),
        })?;
        Self::from_file(name.to_string(), file)
    }

    /// Parse TOML configuration text under an explicit source name
    pub fn from_toml(name: &str, content: &str) -> Result<Self, ConfigError> {
        let file: SourceFile = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from(name),
            error: e.to_string(),
        })?;
        Self::from_file(name.to_string(), file)
    }

    /// Resolve a source given by path or bare name, then load it
    pub fn discover(source: &str) -> Result<Self, ConfigError> {
        Self::load(&find_source(source)?)
    }

    fn from_file(name: String, file: SourceFile) -> Result<Self, ConfigError> {
        if file.paths.is_empty() {
            return Err(ConfigError::NoPaths { name });
        }

        let index_dir = match file.index_dir.as_deref() {
            Some(dir) if !dir.is_empty() => absolute(dir)?,
            _ => default_index_dir(),
        };
        let paths = file
            .paths
            .iter()
            .map(|p| absolute(p))
            .collect::<Result<Vec<_>, _>>()?;

        let filter = PathFilter::new(file.include.as_slice(), file.exclude.as_slice())?;
        if !filter.has_include() {
            tracing::warn!(source = %name, "No include patterns configured; no files will be indexed");
        }

        Ok(Self {
            name,
            index_dir,
            paths,
            filter,
            format: file.format,
            timestamp_format: file.timestamp_format,
        })
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("TIMEFIND_INDEX_DIR") {
            if !dir.is_empty() {
                self.index_dir = PathBuf::from(dir);
            }
        }
    }

    /// Persisted file of the index node for `sub_dir`
    pub fn index_file(&self, sub_dir: &Path) -> PathBuf {
        self.index_dir
            .join(sub_dir)
            .join(format!("{}.csv", self.name))
    }
}

/// Section name of a config file: its base name up to the first `.`
pub fn source_name(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match base.split_once('.') {
        Some((name, _)) => name.to_string(),
        None => base,
    }
}

fn absolute(raw: &str) -> Result<PathBuf, ConfigError> {
    if raw.starts_with('~') {
        return Err(ConfigError::TildePath {
            path: raw.to_string(),
        });
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io {
        path: path.clone(),
        error: e.to_string(),
    })?;
    Ok(cwd.join(path))
}

/// Locate a source configuration.
///
/// `source` is tried as given, then as `<source>.conf.json` and
/// `<source>.toml` in the working directory, the user config directory and
/// `/etc/timefind`.
pub fn find_source(source: &str) -> Result<PathBuf, ConfigError> {
    let given = PathBuf::from(source);
    if given.is_file() {
        return Ok(given);
    }

    let dirs = [
        Some(PathBuf::from(".")),
        dirs::config_dir().map(|p| p.join("timefind")),
        Some(PathBuf::from("/etc/timefind")),
    ];

    for dir in dirs.iter().flatten() {
        for candidate in [format!("{source}.conf.json"), format!("{source}.toml")] {
            let path = dir.join(candidate);
            if path.is_file() {
                tracing::debug!(?path, "Found source configuration");
                return Ok(path);
            }
        }
    }

    Err(ConfigError::NotFound {
        name: source.to_string(),
    })
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Defaults, raised to `debug` when verbose, then environment overrides
    pub fn from_env(verbose: bool) -> Self {
        let mut config = Self::default();
        if verbose {
            config.level = "debug".to_string();
        }
        if let Ok(level) = std::env::var("TIMEFIND_LOG_LEVEL") {
            config.level = level;
        }
        if let Ok(format) = std::env::var("TIMEFIND_LOG_FORMAT") {
            config.format = format;
        }
        config
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Paths cannot start with shell metacharacter '~': {path:?}")]
    TildePath { path: String },

    #[error("Invalid glob pattern {pattern:?}: {error}")]
    Pattern { pattern: String, error: String },

    #[error("Source {name:?} has no data paths")]
    NoPaths { name: String },

    #[error("No configuration found for source {name:?}")]
    NotFound { name: String },
}

/// Generate an example source configuration (TOML)
pub fn generate_example_config() -> String {
    r#"# timefind source configuration
#
# Save as <name>.toml; <name> becomes the index file name (<name>.csv).
# The legacy JSON form (<name>.conf.json) uses the keys indexDir, paths,
# include, exclude and type.
#
# Environment variables:
# - TIMEFIND_INDEX_DIR overrides index_dir
# - TIMEFIND_LOG_LEVEL, TIMEFIND_LOG_FORMAT control logging

# Where index files are written
index_dir = "/var/lib/timefind"

# Data roots; files in later roots are ignored when an earlier root holds
# the same name
paths = ["/data/dns"]

# File name globs. Exclude is checked first; no include matches nothing.
include = ["*.pcap", "*.pcap.gz"]
exclude = ["*.tmp"]

# Extractor: bluecoat, bomgar, cer, codevision, cpp, email,
# fsdb_time_col_1, fsdb_time_col_2, iod, juniper, mrt, pcap, sep,
# snare, stealthwatch, text, win_messages, wireless
type = "pcap"

# Persisted timestamp encoding: unix or rfc3339
timestamp_format = "unix"
"#
    .to_string()
}
