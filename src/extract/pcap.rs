//! Classic libpcap capture files
//!
//! Only the classic pcap container is read: a 24-byte global header followed
//! by 16-byte record headers, in either byte order, with microsecond or
//! nanosecond timestamps. pcapng files are reported as unrecognized.

use super::transport::read_full;
use super::{open_stream, ExtractError, Extractor};
use crate::span::TimeSpan;
use chrono::DateTime;
use std::io::{self, Read};
use std::path::Path;

const MAGIC_MICROS: u32 = 0xa1b2_c3d4;
const MAGIC_NANOS: u32 = 0xa1b2_3c4d;

const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Layout {
    big_endian: bool,
    nanos: bool,
}

impl Layout {
    fn from_magic(magic: [u8; 4]) -> Option<Self> {
        let (big_endian, value) = if u32::from_le_bytes(magic) & 0xffff_0000 == 0xa1b2_0000 {
            (false, u32::from_le_bytes(magic))
        } else {
            (true, u32::from_be_bytes(magic))
        };
        match value {
            MAGIC_MICROS => Some(Layout { big_endian, nanos: false }),
            MAGIC_NANOS => Some(Layout { big_endian, nanos: true }),
            _ => None,
        }
    }

    fn u32_at(&self, buf: &[u8], offset: usize) -> u32 {
        let bytes = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }
}

/// Extractor for `.pcap` capture files
#[derive(Debug, Clone, Copy, Default)]
pub struct PcapExtractor;

impl Extractor for PcapExtractor {
    fn name(&self) -> &str {
        "pcap"
    }

    fn extract(&self, path: &Path) -> Result<TimeSpan, ExtractError> {
        let mut reader = open_stream(path)?;
        let stream_err = |e: io::Error| ExtractError::from_stream(path, e);

        let mut header = [0u8; GLOBAL_HEADER_LEN];
        match read_full(&mut reader, &mut header).map_err(stream_err)? {
            0 => return Ok(TimeSpan::unset()),
            GLOBAL_HEADER_LEN => {}
            n => {
                return Err(ExtractError::truncated(
                    path,
                    format!("global header is {n} bytes"),
                ))
            }
        }

        let layout = Layout::from_magic([header[0], header[1], header[2], header[3]])
            .ok_or_else(|| {
                ExtractError::unrecognized(
                    path,
                    format!("bad pcap magic {:02x?}", &header[..4]),
                )
            })?;

        let mut span = TimeSpan::unset();
        let mut record = [0u8; RECORD_HEADER_LEN];
        let mut packets = 0u64;

        loop {
            match read_full(&mut reader, &mut record).map_err(stream_err)? {
                0 => break,
                RECORD_HEADER_LEN => {}
                n => {
                    return Err(ExtractError::truncated(
                        path,
                        format!("record {packets} header is {n} bytes"),
                    ))
                }
            }

            let secs = layout.u32_at(&record, 0);
            let frac = layout.u32_at(&record, 4);
            let incl_len = layout.u32_at(&record, 8) as u64;

            let nanos = if layout.nanos {
                frac
            } else {
                frac.saturating_mul(1_000)
            };
            let t = DateTime::from_timestamp(secs as i64, nanos).ok_or_else(|| {
                ExtractError::unrecognized(path, format!("record {packets} has bad timestamp"))
            })?;
            span.extend(t);

            let skipped = io::copy(&mut (&mut reader).take(incl_len), &mut io::sink())
                .map_err(stream_err)?;
            if skipped < incl_len {
                return Err(ExtractError::truncated(
                    path,
                    format!("record {packets} body is {skipped} of {incl_len} bytes"),
                ));
            }
            packets += 1;
        }

        tracing::trace!(?path, packets, "Scanned capture");
        Ok(span)
    }
}
