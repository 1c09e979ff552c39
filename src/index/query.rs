//! Range query façade
//!
//! Flattens the matching leaves of an index tree into owned [`Match`]es that
//! callers can sort and print.

use super::error::{IndexError, IndexResult};
use super::node::IndexNode;
use crate::span::{decode_timestamp, encode_timestamp, TimeError, TimeSpan, TimestampFormat};
use chrono::{DateTime, NaiveDate, Utc};
use std::str::FromStr;

/// Inclusive time window; missing bounds are open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeQuery {
    begin: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl RangeQuery {
    /// Window `[begin, end]`; rejects `begin > end`
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> IndexResult<Self> {
        Self::between(Some(begin), Some(end))
    }

    /// Window with optional bounds
    pub fn between(begin: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> IndexResult<Self> {
        if let (Some(b), Some(e)) = (begin, end) {
            if b > e {
                return Err(IndexError::InvalidTimeRange);
            }
        }
        Ok(Self { begin, end })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn since(begin: DateTime<Utc>) -> Self {
        Self {
            begin: Some(begin),
            end: None,
        }
    }

    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            begin: None,
            end: Some(end),
        }
    }

    /// Concrete bounds, open ends widened to the representable extremes
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.begin.unwrap_or(DateTime::<Utc>::MIN_UTC),
            self.end.unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    pub fn run(&self, root: &IndexNode) -> Vec<Match> {
        let (begin, end) = self.window();
        root.find_in_range(begin, end)
            .into_iter()
            .map(|entry| Match {
                path: entry.path.clone(),
                span: entry.span,
            })
            .collect()
    }
}

/// One matching data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub path: String,
    pub span: TimeSpan,
}

impl Match {
    /// The path alone, or followed by its encoded bounds
    pub fn format_line(&self, times: Option<TimestampFormat>) -> String {
        match (times, self.span.bounds()) {
            (Some(format), Some((earliest, latest))) => format!(
                "{} {} {}",
                self.path,
                encode_timestamp(&earliest, format),
                encode_timestamp(&latest, format)
            ),
            _ => self.path.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Path,
    Earliest,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "path" => Ok(SortOrder::Path),
            "earliest" | "time" => Ok(SortOrder::Earliest),
            other => Err(format!("unknown sort order {other:?} (path, earliest)")),
        }
    }
}

/// Sort matches deterministically; ties fall back to the path
pub fn sort_matches(matches: &mut [Match], order: SortOrder) {
    match order {
        SortOrder::Path => matches.sort_by(|a, b| a.path.cmp(&b.path)),
        SortOrder::Earliest => matches.sort_by(|a, b| {
            a.span
                .earliest()
                .cmp(&b.span.earliest())
                .then_with(|| a.path.cmp(&b.path))
        }),
    }
}

/// Parse a command-line time bound.
///
/// Accepts RFC 3339, `YYYY-MM-DD` (midnight UTC) and Unix seconds with an
/// optional fraction. Empty text means no bound.
pub fn parse_time_bound(text: &str) -> Result<Option<DateTime<Utc>>, TimeError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| Some(dt.and_utc()))
            .ok_or_else(|| TimeError::OutOfRange(text.to_string()));
    }

    decode_timestamp(text).map(Some)
}
