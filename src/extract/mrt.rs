//! MRT routing dumps
//!
//! Every record starts with a 12-byte big-endian header: seconds since the
//! epoch, type, subtype and the body length. Extended-timestamp types carry a
//! microsecond field as the first four bytes of the body.

use super::transport::read_full;
use super::{open_stream, ExtractError, Extractor};
use crate::span::TimeSpan;
use chrono::DateTime;
use std::io::{self, Read};
use std::path::Path;

const HEADER_LEN: usize = 12;

/// BGP4MP_ET, ISIS_ET and OSPFv3_ET
const EXTENDED_TYPES: [u16; 3] = [17, 33, 49];

/// Extractor for MRT (RFC 6396) dumps such as RouteViews and RIPE RIS archives
#[derive(Debug, Clone, Copy, Default)]
pub struct MrtExtractor;

impl Extractor for MrtExtractor {
    fn name(&self) -> &str {
        "mrt"
    }

    fn extract(&self, path: &Path) -> Result<TimeSpan, ExtractError> {
        let mut reader = open_stream(path)?;
        let stream_err = |e: io::Error| ExtractError::from_stream(path, e);

        let mut span = TimeSpan::unset();
        let mut header = [0u8; HEADER_LEN];
        let mut records = 0u64;

        loop {
            match read_full(&mut reader, &mut header).map_err(stream_err)? {
                0 => break,
                HEADER_LEN => {}
                n => {
                    return Err(ExtractError::truncated(
                        path,
                        format!("record {records} header is {n} bytes"),
                    ))
                }
            }

            let secs = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            let kind = u16::from_be_bytes([header[4], header[5]]);
            let mut remaining =
                u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as u64;

            let mut micros = 0u32;
            if EXTENDED_TYPES.contains(&kind) && remaining >= 4 {
                let mut field = [0u8; 4];
                let n = read_full(&mut reader, &mut field).map_err(stream_err)?;
                if n < field.len() {
                    return Err(ExtractError::truncated(
                        path,
                        format!("record {records} microsecond field is {n} bytes"),
                    ));
                }
                micros = u32::from_be_bytes(field);
                remaining -= 4;
            }

            let nanos = micros.checked_mul(1_000).filter(|n| *n < 1_000_000_000);
            let t = nanos
                .and_then(|nanos| DateTime::from_timestamp(secs as i64, nanos))
                .ok_or_else(|| {
                    ExtractError::unrecognized(path, format!("record {records} has bad timestamp"))
                })?;
            span.extend(t);

            let skipped = io::copy(&mut (&mut reader).take(remaining), &mut io::sink())
                .map_err(stream_err)?;
            if skipped < remaining {
                return Err(ExtractError::truncated(
                    path,
                    format!("record {records} body is {skipped} of {remaining} bytes"),
                ));
            }
            records += 1;
        }

        tracing::trace!(?path, records, "Scanned MRT dump");
        Ok(span)
    }
}
