//! Line-oriented log extractors
//!
//! Each supported text format is described declaratively by a [`LineFormat`]:
//! how many header lines to skip, and either a list of regex patterns (first
//! match per line wins, lines without a match are ignored) or a delimited
//! column that must hold a timestamp on every data line.

use super::{open_stream, ExtractError, Extractor};
use crate::span::{decode_timestamp, TimeSpan};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::io::BufRead;
use std::path::Path;

/// How the captured timestamp text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLayout {
    /// strftime layout without a zone, read as UTC
    Naive(&'static str),
    /// strftime layout carrying a numeric UTC offset
    Zoned(&'static str),
    /// Whole seconds since the Unix epoch; any fraction is ignored
    EpochSeconds,
    /// RFC 3339 or `<seconds>.<fraction>`
    Encoded,
}

impl TimeLayout {
    pub fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        match self {
            TimeLayout::Naive(layout) => NaiveDateTime::parse_from_str(text, layout)
                .ok()
                .map(|dt| dt.and_utc()),
            TimeLayout::Zoned(layout) => DateTime::parse_from_str(text, layout)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            TimeLayout::EpochSeconds => {
                let secs = text.split('.').next()?.trim().parse::<i64>().ok()?;
                DateTime::from_timestamp(secs, 0)
            }
            TimeLayout::Encoded => decode_timestamp(text).ok(),
        }
    }
}

/// A regex whose first capture group (or whole match) is a timestamp
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    layout: TimeLayout,
}

impl Pattern {
    pub fn new(regex: &str, layout: TimeLayout) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(regex)?,
            layout,
        })
    }

    fn find<'l>(&self, line: &'l str) -> Option<&'l str> {
        let caps = self.regex.captures(line)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }
}

/// Where timestamps live within a line
#[derive(Debug, Clone)]
pub enum LineRule {
    /// Try each pattern in order; lines matching none are skipped
    Search(Vec<Pattern>),
    /// Every data line holds a timestamp in this column
    Column {
        delimiter: char,
        index: usize,
        layout: TimeLayout,
    },
}

/// Declarative description of a line-oriented log format
#[derive(Debug, Clone)]
pub struct LineFormat {
    pub name: &'static str,
    /// Lines to discard before scanning (fixed-size headers)
    pub skip_lines: usize,
    /// Lines starting with `#` are comments or headers
    pub skip_comments: bool,
    pub rule: LineRule,
}

// Shared timestamp shapes
const ISO_SPACE: &str = r"(\d{1,4}-\d{1,2}-\d{1,2} \d{1,2}:\d{1,2}:\d{1,2})";
const ISO_T: &str = r"(\d{1,4}-\d{1,2}-\d{1,2}T\d{1,2}:\d{1,2}:\d{1,2})";
const ISO_T_OFFSET: &str = r"(\d{1,4}-\d{1,2}-\d{1,2}T\d{1,2}:\d{1,2}:\d{1,2}[+-]\d{4})";
const ISO_T_COLON_OFFSET: &str =
    r"(\d{1,4}-\d{1,2}-\d{1,2}T\d{1,2}:\d{1,2}:\d{1,2}[+-]\d{1,2}:\d{2})";
const MONTH_DAY_YEAR: &str = r"([A-Za-z]{3} +\d{1,2} \d{4} \d{1,2}:\d{1,2}:\d{1,2})";
const CTIME: &str = r"([A-Za-z]{3} [A-Za-z]{3} +\d{1,2} \d{1,2}:\d{1,2}:\d{1,2} \d{4})";

fn search(patterns: &[(&str, TimeLayout)]) -> LineRule {
    LineRule::Search(
        patterns
            .iter()
            .filter_map(|(re, layout)| match Pattern::new(re, *layout) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::error!(pattern = %re, error = %e, "Invalid built-in pattern");
                    None
                }
            })
            .collect(),
    )
}

impl LineFormat {
    fn searching(name: &'static str, patterns: &[(&str, TimeLayout)]) -> Self {
        Self {
            name,
            skip_lines: 0,
            skip_comments: false,
            rule: search(patterns),
        }
    }

    fn fsdb(name: &'static str, index: usize) -> Self {
        Self {
            name,
            skip_lines: 0,
            skip_comments: true,
            rule: LineRule::Column {
                delimiter: '\t',
                index,
                layout: TimeLayout::Encoded,
            },
        }
    }

    /// The text formats shipped with timefind
    pub fn builtin() -> Vec<LineFormat> {
        use TimeLayout::*;

        vec![
            LineFormat {
                skip_lines: 6,
                ..Self::searching("bluecoat", &[(ISO_SPACE, Naive("%Y-%m-%d %H:%M:%S"))])
            },
            Self::searching("bomgar", &[(r"when=(\d{1,10})", EpochSeconds)]),
            Self::searching(
                "cer",
                &[(
                    r#"received="(\d{1,4}-\d{1,2}-\d{1,2} \d{1,2}:\d{1,2}:\d{1,2}\.\d{1,9}[+-]\d{1,2}:\d{2})"#,
                    Zoned("%Y-%m-%d %H:%M:%S%.f%:z"),
                )],
            ),
            Self::searching(
                "codevision",
                &[(
                    r"timestamp=(\d{1,4}-\d{1,2}-\d{1,2}T\d{1,2}:\d{1,2}:\d{1,2}[+-]\d{1,2}:\d{2})",
                    Zoned("%Y-%m-%dT%H:%M:%S%:z"),
                )],
            ),
            LineFormat {
                name: "cpp",
                skip_lines: 0,
                skip_comments: false,
                rule: LineRule::Column {
                    delimiter: ',',
                    index: 0,
                    layout: EpochSeconds,
                },
            },
            Self::searching(
                "email",
                &[(
                    r"DATETIME\](\d{1,4}\.\d{1,2}\.\d{1,2} \d{1,2}:\d{1,2}:\d{1,2}\.\d{1,9})",
                    Naive("%Y.%m.%d %H:%M:%S%.f"),
                )],
            ),
            Self::fsdb("fsdb_time_col_1", 0),
            Self::fsdb("fsdb_time_col_2", 1),
            Self::searching("iod", &[(ISO_T_OFFSET, Zoned("%Y-%m-%dT%H:%M:%S%z"))]),
            Self::searching(
                "juniper",
                &[
                    (ISO_SPACE, Naive("%Y-%m-%d %H:%M:%S")),
                    (MONTH_DAY_YEAR, Naive("%b %d %Y %H:%M:%S")),
                ],
            ),
            Self::searching(
                "snare",
                &[
                    (CTIME, Naive("%a %b %d %H:%M:%S %Y")),
                    (ISO_T_OFFSET, Zoned("%Y-%m-%dT%H:%M:%S%z")),
                ],
            ),
            Self::searching(
                "sep",
                &[
                    (
                        r"Event time: (\d{1,4}-\d{1,2}-\d{1,2} \d{1,2}:\d{1,2}:\d{1,2})",
                        Naive("%Y-%m-%d %H:%M:%S"),
                    ),
                    (
                        r"Begin: (\d{1,4}-\d{1,2}-\d{1,2} \d{1,2}:\d{1,2}:\d{1,2})",
                        Naive("%Y-%m-%d %H:%M:%S"),
                    ),
                    (MONTH_DAY_YEAR, Naive("%b %d %Y %H:%M:%S")),
                ],
            ),
            Self::searching("stealthwatch", &[(ISO_T, Naive("%Y-%m-%dT%H:%M:%S"))]),
            Self::searching("text", &[(MONTH_DAY_YEAR, Naive("%b %d %Y %H:%M:%S"))]),
            Self::searching(
                "win_messages",
                &[
                    (CTIME, Naive("%a %b %d %H:%M:%S %Y")),
                    (ISO_T_COLON_OFFSET, Zoned("%Y-%m-%dT%H:%M:%S%:z")),
                ],
            ),
            Self::searching(
                "wireless",
                &[
                    (
                        r"Time=(\d{1,4}-\d{1,2}-\d{1,2}T\d{1,2}:\d{1,2}:\d{1,2})",
                        Naive("%Y-%m-%dT%H:%M:%S"),
                    ),
                    (
                        r"([A-Za-z]{3} +\d{1,2} \d{1,2}:\d{1,2}:\d{1,2} \d{4})",
                        Naive("%b %d %H:%M:%S %Y"),
                    ),
                ],
            ),
        ]
    }

    /// Extract the timestamp of one line, if it carries one
    fn timestamp(&self, path: &Path, line: &str) -> Result<Option<DateTime<Utc>>, ExtractError> {
        match &self.rule {
            LineRule::Search(patterns) => {
                for pattern in patterns {
                    if let Some(text) = pattern.find(line) {
                        let t = pattern.layout.parse(text).ok_or_else(|| {
                            ExtractError::unrecognized(path, format!("bad timestamp {text:?}"))
                        })?;
                        return Ok(Some(t));
                    }
                }
                Ok(None)
            }
            LineRule::Column {
                delimiter,
                index,
                layout,
            } => {
                if line.trim().is_empty() {
                    return Ok(None);
                }
                let field = line.split(*delimiter).nth(*index).ok_or_else(|| {
                    ExtractError::unrecognized(path, format!("missing column {index} in {line:?}"))
                })?;
                layout.parse(field.trim()).map(Some).ok_or_else(|| {
                    ExtractError::unrecognized(path, format!("bad timestamp {field:?}"))
                })
            }
        }
    }
}

/// Extractor driven by a [`LineFormat`]
#[derive(Debug, Clone)]
pub struct LineExtractor {
    format: LineFormat,
}

impl LineExtractor {
    pub fn new(format: LineFormat) -> Self {
        Self { format }
    }
}

impl Extractor for LineExtractor {
    fn name(&self) -> &str {
        self.format.name
    }

    fn extract(&self, path: &Path) -> Result<TimeSpan, ExtractError> {
        let mut reader = open_stream(path)?;
        let mut span = TimeSpan::unset();
        let mut buf = Vec::new();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| ExtractError::from_stream(path, e))?;
            if n == 0 {
                break;
            }
            line_no += 1;
            if line_no <= self.format.skip_lines {
                continue;
            }

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(|c: char| c == '\n' || c == '\r');
            if self.format.skip_comments && line.starts_with('#') {
                continue;
            }

            if let Some(t) = self.format.timestamp(path, line)? {
                span.extend(t);
            }
        }

        Ok(span)
    }
}
