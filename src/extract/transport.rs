//! Decompression transport
//!
//! Archived logs arrive plain or compressed with gzip, bzip2, xz or LZ4
//! frames, and their suffixes are not trustworthy (rotated `.1` files, `.gz` files that were never
//! compressed). The stream is chosen by sniffing the leading magic bytes.

use super::ExtractError;
use bzip2::bufread::MultiBzDecoder;
use flate2::bufread::MultiGzDecoder;
use lz4_flex::frame::FrameDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use xz2::bufread::XzDecoder;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const LZ4_FRAME_MAGIC: &[u8] = &[0x04, 0x22, 0x4d, 0x18];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// Compression detected at the head of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Lz4,
}

impl Compression {
    /// Identify the compression from the first bytes of a file
    pub fn detect(head: &[u8]) -> Self {
        if head.starts_with(GZIP_MAGIC) {
            Compression::Gzip
        } else if head.starts_with(BZIP2_MAGIC) {
            Compression::Bzip2
        } else if head.starts_with(XZ_MAGIC) {
            Compression::Xz
        } else if head.starts_with(LZ4_FRAME_MAGIC) {
            Compression::Lz4
        } else {
            Compression::None
        }
    }
}

/// Open a file and wrap it in the matching decompression stream
pub fn open_stream(path: &Path) -> Result<Box<dyn BufRead + Send>, ExtractError> {
    let file = File::open(path).map_err(|e| ExtractError::unreadable(path, e))?;
    let mut reader = BufReader::new(file);

    let compression = {
        let head = reader
            .fill_buf()
            .map_err(|e| ExtractError::unreadable(path, e))?;
        Compression::detect(head)
    };

    tracing::trace!(?path, ?compression, "Opened data stream");

    Ok(match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(reader))),
        Compression::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(reader))),
        Compression::Xz => Box::new(BufReader::new(XzDecoder::new_multi_decoder(reader))),
        Compression::Lz4 => Box::new(BufReader::new(FrameDecoder::new(reader))),
    })
}

/// Fill `buf` completely, returning how many bytes were read before EOF
pub(crate) fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::tempdir;

    const TEXT: &str = "line one\nline two\n";

    fn read_all(path: &Path) -> String {
        let mut out = String::new();
        open_stream(path).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_detect() {
        assert_eq!(Compression::detect(b""), Compression::None);
        assert_eq!(Compression::detect(b"plain text"), Compression::None);
        assert_eq!(Compression::detect(&[0x1f, 0x8b, 8]), Compression::Gzip);
        assert_eq!(
            Compression::detect(&[0x04, 0x22, 0x4d, 0x18, 0x64]),
            Compression::Lz4
        );
        assert_eq!(Compression::detect(b"BZh91AY"), Compression::Bzip2);
        assert_eq!(
            Compression::detect(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]),
            Compression::Xz
        );
    }

    #[test]
    fn test_plain_stream() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.log");
        std::fs::write(&path, TEXT).unwrap();
        assert_eq!(read_all(&path), TEXT);
    }

    #[test]
    fn test_gzip_stream_regardless_of_suffix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rotated.log.1");

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(TEXT.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert_eq!(read_all(&path), TEXT);
    }

    #[test]
    fn test_bzip2_stream() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.bz2");

        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(TEXT.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert_eq!(read_all(&path), TEXT);
    }

    #[test]
    fn test_concatenated_bzip2_members() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("joined.log");

        let mut bytes = Vec::new();
        for part in ["line one\n", "line two\n"] {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(part.as_bytes()).unwrap();
            bytes.extend(encoder.finish().unwrap());
        }
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(read_all(&path), TEXT);
    }

    #[test]
    fn test_xz_stream_regardless_of_suffix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rotated.log.2");

        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(TEXT.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert_eq!(read_all(&path), TEXT);
    }

    #[test]
    fn test_damaged_bzip2_fails_on_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.bz2");
        std::fs::write(&path, b"BZh91AY&SYgarbage").unwrap();

        let mut out = String::new();
        assert!(open_stream(&path).unwrap().read_to_string(&mut out).is_err());
    }

    #[test]
    fn test_lz4_stream() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.lz4");

        let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
        encoder.write_all(TEXT.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert_eq!(read_all(&path), TEXT);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = open_stream(&dir.path().join("gone.log")).err().unwrap();
        assert!(err.is_not_found());
    }
}
