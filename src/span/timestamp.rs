//! Timestamp text codec
//!
//! Two encodings are understood when decoding:
//! - RFC 3339 with up to nanosecond precision (`2015-07-14T23:52:57.001325Z`)
//! - Unix seconds with an optional fraction (`1436917977.001325000`)
//!
//! Only one is ever written for a given index; the choice is carried by the
//! source configuration as a [`TimestampFormat`].

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while decoding timestamps
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// Text is neither RFC 3339 nor `<seconds>.<fraction>`
    #[error("not a valid timestamp: {0:?}")]
    Invalid(String),

    /// Value parsed but lies outside the representable range
    #[error("timestamp out of range: {0:?}")]
    OutOfRange(String),
}

/// Persisted timestamp encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFormat {
    /// `<seconds>.<nanoseconds>` with exactly nine fraction digits
    #[default]
    Unix,
    /// RFC 3339, UTC, nanoseconds kept when present
    Rfc3339,
}

impl std::fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimestampFormat::Unix => write!(f, "unix"),
            TimestampFormat::Rfc3339 => write!(f, "rfc3339"),
        }
    }
}

/// The "unset" sentinel: 0001-01-01T00:00:00Z.
///
/// Older index files write this value for files without any timestamp and
/// for rows whose modification time was never recorded.
pub fn zero_time() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Check whether a timestamp is the unset sentinel
pub fn is_zero_time(t: &DateTime<Utc>) -> bool {
    *t == zero_time()
}

/// Encode a timestamp in the given format
pub fn encode_timestamp(t: &DateTime<Utc>, format: TimestampFormat) -> String {
    match format {
        TimestampFormat::Unix => format!("{}.{:09}", t.timestamp(), t.timestamp_subsec_nanos()),
        TimestampFormat::Rfc3339 => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }
}

/// Encode an optional timestamp, writing the zero sentinel for `None`
pub fn encode_optional(t: Option<&DateTime<Utc>>, format: TimestampFormat) -> String {
    match t {
        Some(t) => encode_timestamp(t, format),
        None => encode_timestamp(&zero_time(), format),
    }
}

/// Decode a timestamp, trying RFC 3339 first and Unix seconds second
pub fn decode_timestamp(text: &str) -> Result<DateTime<Utc>, TimeError> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    decode_unix(text)
}

/// Decode a timestamp, mapping the zero sentinel to `None`
pub fn decode_optional(text: &str) -> Result<Option<DateTime<Utc>>, TimeError> {
    let t = decode_timestamp(text)?;
    Ok(if is_zero_time(&t) { None } else { Some(t) })
}

/// Decode `<seconds>[.<fraction>]`.
///
/// The fraction is a decimal fraction of a second: `.5` is half a second and
/// `.000000001` one nanosecond. At most nine fraction digits are accepted.
/// Negative values keep the fraction as a positive offset, matching what
/// [`encode_timestamp`] writes for instants before the epoch.
fn decode_unix(text: &str) -> Result<DateTime<Utc>, TimeError> {
    let invalid = || TimeError::Invalid(text.to_string());

    let mut parts = text.split('.');
    let secs_text = parts.next().ok_or_else(invalid)?;
    let frac_text = parts.next();
    if parts.next().is_some() {
        return Err(invalid());
    }

    let secs: i64 = secs_text.parse().map_err(|_| invalid())?;
    // "-0.x" has no encoding: -0.5s is written as "-1.500000000"
    if secs == 0 && secs_text.starts_with('-') && frac_text.is_some() {
        return Err(invalid());
    }

    let nanos = match frac_text {
        None => 0,
        Some(frac) => {
            if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let digits: u32 = frac.parse().map_err(|_| invalid())?;
            digits * 10u32.pow(9 - frac.len() as u32)
        }
    };

    DateTime::from_timestamp(secs, nanos).ok_or_else(|| TimeError::OutOfRange(text.to_string()))
}
