//! Persistence codec
//!
//! One CSV file per index node, one row per entry:
//!
//! ```text
//! path,earliest,latest,modified
//! ```
//!
//! Rows with only three fields come from older indexes that did not record
//! modification times; they decode with `modified = None`. Unset spans and
//! missing modification times are written as the zero sentinel. A span with
//! only one bound set decodes to that instant.

use super::error::{IndexError, IndexResult};
use crate::span::{decode_optional, encode_optional, TimeSpan, TimestampFormat};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Decoded form of one persisted row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub path: String,
    pub span: TimeSpan,
    pub modified: Option<DateTime<Utc>>,
}

impl IndexRow {
    fn encode(&self, format: TimestampFormat) -> [String; 4] {
        let (earliest, latest) = self.span.encode(format);
        [
            self.path.clone(),
            earliest,
            latest,
            encode_optional(self.modified.as_ref(), format),
        ]
    }

    fn decode(record: &csv::StringRecord) -> Result<Self, String> {
        if record.len() != 3 && record.len() != 4 {
            return Err(format!("expected 3 or 4 fields, found {}", record.len()));
        }

        let span = TimeSpan::decode(&record[1], &record[2]).map_err(|e| e.to_string())?;
        let modified = match record.get(3) {
            Some(text) => decode_optional(text).map_err(|e| e.to_string())?,
            None => None,
        };

        Ok(Self {
            path: record[0].to_string(),
            span,
            modified,
        })
    }
}

/// Decode every row. Any bad row fails the whole read.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<IndexRow>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let row = IndexRow::decode(&record).map_err(|e| format!("row {}: {e}", line + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Encode rows sorted by path
pub fn write_rows<W: Write>(
    writer: W,
    rows: &mut [IndexRow],
    format: TimestampFormat,
) -> std::io::Result<W> {
    rows.sort_by(|a, b| a.path.cmp(&b.path));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    for row in rows.iter() {
        writer.write_record(row.encode(format))?;
    }
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error())
}

/// Read a persisted index file
pub fn read_file(path: &Path) -> IndexResult<Vec<IndexRow>> {
    let file = File::open(path).map_err(|e| IndexError::io(path, e))?;
    read_rows(file).map_err(|reason| IndexError::decode(path, reason))
}

/// Replace an index file atomically.
///
/// Rows go to `<file>.new`, which is synced and then renamed over `file`.
pub fn write_file(path: &Path, rows: &mut [IndexRow], format: TimestampFormat) -> IndexResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".new");
    let tmp = Path::new(&tmp);

    let file = File::create(tmp).map_err(|e| IndexError::io(tmp, e))?;
    let file = write_rows(file, rows, format).map_err(|e| IndexError::io(tmp, e))?;
    file.sync_all().map_err(|e| IndexError::io(tmp, e))?;
    drop(file);

    std::fs::rename(tmp, path).map_err(|e| IndexError::io(path, e))?;
    tracing::trace!(?path, rows = rows.len(), "Wrote index file");
    Ok(())
}
