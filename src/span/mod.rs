//! Time spans
//!
//! A [`TimeSpan`] summarises the event timestamps found in a file (or in a
//! whole directory subtree) as one inclusive `[earliest, latest]` interval.
//! Spans form a join-semilattice under [`TimeSpan::union`] with the unset span
//! as identity, so merging the same spans again across update passes is
//! harmless.
//!
//! - **timestamp**: text encodings for instants (RFC 3339 and Unix seconds)

mod timestamp;

pub use timestamp::{
    decode_optional, decode_timestamp, encode_optional, encode_timestamp, is_zero_time, zero_time,
    TimeError, TimestampFormat,
};

use chrono::{DateTime, Utc};

/// Inclusive time interval `[earliest, latest]`, or unset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeSpan {
    bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl TimeSpan {
    /// The unset span (no timestamps observed)
    pub const fn unset() -> Self {
        Self { bounds: None }
    }

    /// Smallest span covering two instants, given in either order.
    ///
    /// Use [`TimeSpan::try_new`] when an inverted pair must be rejected.
    pub fn new(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        Self {
            bounds: Some((a.min(b), a.max(b))),
        }
    }

    /// Create a span, returning None if earliest > latest
    pub fn try_new(earliest: DateTime<Utc>, latest: DateTime<Utc>) -> Option<Self> {
        if earliest <= latest {
            Some(Self {
                bounds: Some((earliest, latest)),
            })
        } else {
            None
        }
    }

    /// A span covering a single instant
    pub fn instant(t: DateTime<Utc>) -> Self {
        Self {
            bounds: Some((t, t)),
        }
    }

    /// True when no timestamp has been merged in
    pub fn is_unset(&self) -> bool {
        self.bounds.is_none()
    }

    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.bounds.map(|(e, _)| e)
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.bounds.map(|(_, l)| l)
    }

    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.bounds
    }

    /// Smallest span covering both inputs. The unset span contributes nothing.
    pub fn union(&self, other: &TimeSpan) -> TimeSpan {
        match (self.bounds, other.bounds) {
            (None, _) => *other,
            (_, None) => *self,
            (Some((e1, l1)), Some((e2, l2))) => TimeSpan {
                bounds: Some((e1.min(e2), l1.max(l2))),
            },
        }
    }

    /// In-place [`union`](Self::union)
    pub fn merge(&mut self, other: &TimeSpan) {
        *self = self.union(other);
    }

    /// Widen the span to include one instant
    pub fn extend(&mut self, t: DateTime<Utc>) {
        self.merge(&TimeSpan::instant(t));
    }

    /// Check whether this span intersects the inclusive window `[begin, end]`.
    ///
    /// Unset spans never overlap anything.
    pub fn overlaps(&self, begin: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        match self.bounds {
            None => false,
            Some((earliest, latest)) => !(latest < begin || earliest > end),
        }
    }

    /// Check if an instant falls within this span
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.overlaps(t, t)
    }

    /// Encode as `(earliest, latest)` text, unset bounds as the zero sentinel
    pub fn encode(&self, format: TimestampFormat) -> (String, String) {
        (
            encode_optional(self.earliest().as_ref(), format),
            encode_optional(self.latest().as_ref(), format),
        )
    }

    /// Decode from `(earliest, latest)` text.
    ///
    /// Both bounds set to the zero sentinel decode as unset. A single set
    /// bound collapses to that instant; older indexes wrote directory rows
    /// with a zero earliest after merging an empty file. An inverted
    /// interval is an error.
    pub fn decode(earliest: &str, latest: &str) -> Result<TimeSpan, TimeError> {
        match (decode_optional(earliest)?, decode_optional(latest)?) {
            (None, None) => Ok(TimeSpan::unset()),
            (Some(t), None) | (None, Some(t)) => Ok(TimeSpan::instant(t)),
            (Some(e), Some(l)) => TimeSpan::try_new(e, l)
                .ok_or_else(|| TimeError::Invalid(format!("{earliest} is after {latest}"))),
        }
    }
}

impl FromIterator<DateTime<Utc>> for TimeSpan {
    fn from_iter<I: IntoIterator<Item = DateTime<Utc>>>(iter: I) -> Self {
        let mut span = TimeSpan::unset();
        for t in iter {
            span.extend(t);
        }
        span
    }
}

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.bounds {
            None => write!(f, "[unset]"),
            Some((e, l)) => write!(f, "[{}, {}]", e.to_rfc3339(), l.to_rfc3339()),
        }
    }
}
