//! Microcode update record header: layout constants, decoding and the
//! exact-offset validator every other operation is built on.

use crate::error::{ImageRole, Result, UcodeError};
use serde::Serialize;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use tracing::debug;

/// Marker that must appear at both 0x00 and 0x14 of a record header.
pub const RECORD_MARKER: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// First byte of [`RECORD_MARKER`], used by the scanner as a cheap pre-check.
pub const SIGNATURE_BYTE: u8 = RECORD_MARKER[0];

/// Effective length of records whose size field is zero.
pub const DEFAULT_RECORD_SIZE: u64 = 0x800;

/// Bytes needed to check both markers.
pub const MARKER_WINDOW: usize = 0x18;

/// Bytes needed to decode every header field.
pub const HEADER_WINDOW: usize = 0x22;

const MARKER_A_OFFSET: usize = 0x00;
const REVISION_OFFSET: usize = 0x04;
const CPUID_OFFSET: usize = 0x0C;
const MARKER_B_OFFSET: usize = 0x14;
const PLATFORM_OFFSET: usize = 0x18;
const SIZE_OFFSET: usize = 0x20;

pub const TABLE_HEADER: &str = concat!(
    " CPUID | Pf | Rev | Offset  | Size\n",
    "-------+----+-----+---------+--------"
);

/// One validated record header. Produced by [`validate`] and the scanner,
/// consumed by the operation that asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MicrocodeRecord {
    pub position: u64,
    pub revision: u16,
    pub cpuid: u32,
    pub platform: u8,
    /// Raw value of the size field; zero on older records.
    pub declared_size: u16,
    /// Length used for copy and erase, with the zero-size default applied.
    pub size: u64,
}

impl MicrocodeRecord {
    /// Decodes a header window read from `position`.
    ///
    /// Returns `None` when fewer than [`MARKER_WINDOW`] bytes are present or
    /// either marker does not match. Fields past the end of `header` decode
    /// as zero, so a truncated size field falls back to the default size.
    pub fn decode(position: u64, header: &[u8]) -> Option<Self> {
        if header.len() < MARKER_WINDOW {
            return None;
        }

        if header[MARKER_A_OFFSET..MARKER_A_OFFSET + 4] != RECORD_MARKER
            || header[MARKER_B_OFFSET..MARKER_B_OFFSET + 4] != RECORD_MARKER
        {
            return None;
        }

        let cpuid_low = le_u16(header, CPUID_OFFSET) as u32;
        let cpuid_high = le_u16(header, CPUID_OFFSET + 2) as u32;
        let declared_size = le_u16(header, SIZE_OFFSET);

        let size = match declared_size {
            0 => DEFAULT_RECORD_SIZE,
            n => n as u64,
        };

        Some(Self {
            position,
            revision: le_u16(header, REVISION_OFFSET),
            cpuid: cpuid_low | cpuid_high << 16,
            platform: header.get(PLATFORM_OFFSET).copied().unwrap_or(0),
            declared_size,
            size,
        })
    }

    /// First byte past the record.
    #[inline]
    pub fn end(&self) -> u64 {
        self.position + self.size
    }
}

impl fmt::Display for MicrocodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " {:5X} | {:02X} | {:3X} | 0x{:05X} | 0x{:04X}",
            self.cpuid, self.platform, self.revision, self.position, self.size
        )
    }
}

fn le_u16(bytes: &[u8], offset: usize) -> u16 {
    match bytes.get(offset..offset + 2) {
        Some(b) => u16::from_le_bytes([b[0], b[1]]),
        None => 0,
    }
}

/// Checks for a record starting exactly at `offset`.
///
/// The stream position is the same after the call as before it, whatever
/// the outcome. I/O failures are errors; a short read is just "no record".
pub fn validate<R: Read + Seek>(stream: &mut R, offset: u64) -> Result<Option<MicrocodeRecord>> {
    let (window, filled) = peek_window(stream, offset)?;
    Ok(MicrocodeRecord::decode(offset, &window[..filled]))
}

/// Like [`validate`], but a missing record is a `RecordNotFound` error.
pub fn require<R: Read + Seek>(
    stream: &mut R,
    offset: u64,
    image: ImageRole,
) -> Result<MicrocodeRecord> {
    match validate(stream, offset)? {
        Some(record) => Ok(record),
        None => {
            let header = header_hex(stream, offset)?;
            debug!(%image, offset, %header, "marker mismatch");
            Err(UcodeError::RecordNotFound { image, offset })
        }
    }
}

/// Hex dump of the marker window at `offset`.
pub(crate) fn header_hex<R: Read + Seek>(stream: &mut R, offset: u64) -> Result<String> {
    let (window, filled) = peek_window(stream, offset)?;
    Ok(hex::encode(&window[..filled.min(MARKER_WINDOW)]))
}

type Window = ([u8; HEADER_WINDOW], usize);

fn peek_window<R: Read + Seek>(stream: &mut R, offset: u64) -> io::Result<Window> {
    let original = stream.stream_position()?;
    let result = read_window(stream, offset);
    stream.seek(SeekFrom::Start(original))?;
    result
}

fn read_window<R: Read + Seek>(stream: &mut R, offset: u64) -> io::Result<Window> {
    stream.seek(SeekFrom::Start(offset))?;

    let mut window = [0u8; HEADER_WINDOW];
    let mut filled = 0;

    while filled < HEADER_WINDOW {
        match stream.read(&mut window[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok((window, filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(revision: u16, cpuid: u32, platform: u8, size: u16) -> Vec<u8> {
        let mut h = vec![0u8; 0x30];
        h[0x00..0x04].copy_from_slice(&RECORD_MARKER);
        h[0x04..0x06].copy_from_slice(&revision.to_le_bytes());
        h[0x0C..0x10].copy_from_slice(&cpuid.to_le_bytes());
        h[0x14..0x18].copy_from_slice(&RECORD_MARKER);
        h[0x18] = platform;
        h[0x20..0x22].copy_from_slice(&size.to_le_bytes());
        h
    }

    #[test]
    fn test_decode_all_fields() {
        let h = header(0x2A, 0x000306C3, 0x32, 0x5400);
        let record = MicrocodeRecord::decode(0x40, &h).unwrap();

        assert_eq!(record.position, 0x40);
        assert_eq!(record.revision, 0x2A);
        assert_eq!(record.cpuid, 0x000306C3);
        assert_eq!(record.platform, 0x32);
        assert_eq!(record.declared_size, 0x5400);
        assert_eq!(record.size, 0x5400);
        assert_eq!(record.end(), 0x5440);
    }

    #[test]
    fn test_zero_size_defaults_to_0x800() {
        let record = MicrocodeRecord::decode(0, &header(1, 0x106A5, 3, 0)).unwrap();
        assert_eq!(record.declared_size, 0);
        assert_eq!(record.size, DEFAULT_RECORD_SIZE);
    }

    #[test]
    fn test_cpuid_combines_two_halves() {
        let mut h = header(1, 0, 0, 0x400);
        h[0x0C..0x0E].copy_from_slice(&0x06C3u16.to_le_bytes());
        h[0x0E..0x10].copy_from_slice(&0x0003u16.to_le_bytes());
        assert_eq!(MicrocodeRecord::decode(0, &h).unwrap().cpuid, 0x306C3);
    }

    #[test]
    fn test_rejects_bad_marker_a() {
        let mut h = header(1, 0x306C3, 1, 0x400);
        h[0x01] = 0x01;
        assert!(MicrocodeRecord::decode(0, &h).is_none());
    }

    #[test]
    fn test_rejects_bad_marker_b() {
        let mut h = header(1, 0x306C3, 1, 0x400);
        h[0x14] = 0x02;
        assert!(MicrocodeRecord::decode(0, &h).is_none());
    }

    #[test]
    fn test_rejects_short_window() {
        let h = header(1, 0x306C3, 1, 0x400);
        assert!(MicrocodeRecord::decode(0, &h[..MARKER_WINDOW - 1]).is_none());
    }

    #[test]
    fn test_truncated_size_field_uses_default() {
        let h = header(1, 0x306C3, 7, 0x400);
        let record = MicrocodeRecord::decode(0, &h[..0x19]).unwrap();
        assert_eq!(record.platform, 7);
        assert_eq!(record.size, DEFAULT_RECORD_SIZE);
    }

    #[test]
    fn test_validate_restores_position() {
        let mut image = vec![0xAAu8; 0x100];
        image[0x80..0xB0].copy_from_slice(&header(3, 0x206A7, 0x12, 0x40));
        let mut stream = Cursor::new(image);
        stream.set_position(0x10);

        let found = validate(&mut stream, 0x80).unwrap().unwrap();
        assert_eq!(found.position, 0x80);
        assert_eq!(stream.position(), 0x10);

        assert!(validate(&mut stream, 0x84).unwrap().is_none());
        assert_eq!(stream.position(), 0x10);
    }

    #[test]
    fn test_validate_past_end_is_none() {
        let mut stream = Cursor::new(vec![0u8; 16]);
        assert!(validate(&mut stream, 64).unwrap().is_none());
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_require_reports_missing_record() {
        let mut stream = Cursor::new(vec![0u8; 0x40]);
        assert!(matches!(
            require(&mut stream, 0, ImageRole::Rom),
            Err(UcodeError::RecordNotFound { image: ImageRole::Rom, offset: 0 })
        ));
    }

    #[test]
    fn test_header_hex_shows_marker_window() {
        let mut stream = Cursor::new(vec![0xFFu8; 4]);
        assert_eq!(header_hex(&mut stream, 0).unwrap(), "ffffffff");
    }

    #[test]
    fn test_table_row_format() {
        let record = MicrocodeRecord::decode(0x1000, &header(0x2A, 0x306C3, 0x32, 0x5400)).unwrap();
        assert_eq!(record.to_string(), " 306C3 | 32 |  2A | 0x01000 | 0x5400");
    }
}
