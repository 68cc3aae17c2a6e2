use crate::confirm::{ConfirmGate, PendingWrite, WriteKind};
use crate::error::{ImageRole, Result, UcodeError};
use crate::io::stream_len;
use crate::record::{self, MicrocodeRecord};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{info, warn};

/// Erased flash reads back as all ones.
pub const DEFAULT_FILL: i64 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erased {
    pub record: MicrocodeRecord,
    pub fill: u8,
}

/// Checks that a requested fill value fits in a byte.
pub fn fill_byte(value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| {
        UcodeError::InvalidArgument(format!("fill value {} is outside 0..=255", value))
    })
}

/// Overwrites the record at `offset` with `fill`, once the gate agrees.
///
/// There is no force mode: a valid record must be present.
pub fn erase<W, G>(rom: &mut W, offset: u64, fill: i64, gate: &mut G) -> Result<Erased>
where
    W: Read + Write + Seek,
    G: ConfirmGate + ?Sized,
{
    let fill = fill_byte(fill)?;
    let record = record::require(rom, offset, ImageRole::Rom)?;

    let rom_len = stream_len(rom)?;
    if record.end() > rom_len {
        warn!(
            offset,
            size = record.size,
            rom_len,
            "record runs past the end of the ROM image, erase will extend it"
        );
    }

    let pending = PendingWrite {
        offset,
        length: record.size,
        existing: Some(record),
        kind: WriteKind::Erase { fill },
    };
    if !gate.confirm(&pending)? {
        return Err(UcodeError::Cancelled);
    }

    let pattern = vec![fill; record.size as usize];
    rom.seek(SeekFrom::Start(offset))?;
    rom.write_all(&pattern)?;
    rom.flush()?;

    info!(offset, size = record.size, fill, "record erased");

    Ok(Erased { record, fill })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RECORD_MARKER;
    use std::io::Cursor;

    fn rom_with_record(at: usize, size: u16) -> Vec<u8> {
        let mut rom = vec![0x5Au8; 0x2000];
        rom[at..at + 4].copy_from_slice(&RECORD_MARKER);
        rom[at + 0x14..at + 0x18].copy_from_slice(&RECORD_MARKER);
        rom[at + 0x20..at + 0x22].copy_from_slice(&size.to_le_bytes());
        rom
    }

    fn accept(_: &PendingWrite) -> Result<bool> {
        Ok(true)
    }

    fn never(_: &PendingWrite) -> Result<bool> {
        panic!("gate must not be reached")
    }

    #[test]
    fn test_fill_byte_bounds() {
        assert!(matches!(fill_byte(-1), Err(UcodeError::InvalidArgument(_))));
        assert!(matches!(fill_byte(256), Err(UcodeError::InvalidArgument(_))));
        assert_eq!(fill_byte(0).unwrap(), 0x00);
        assert_eq!(fill_byte(255).unwrap(), 0xFF);
    }

    #[test]
    fn test_erase_fills_declared_size() {
        let rom = rom_with_record(0x100, 0x300);
        let mut stream = Cursor::new(rom.clone());

        let erased = erase(&mut stream, 0x100, 0x00, &mut accept).unwrap();
        assert_eq!(erased.record.size, 0x300);

        let result = stream.into_inner();
        assert!(result[0x100..0x400].iter().all(|&b| b == 0x00));
        assert_eq!(&result[..0x100], &rom[..0x100]);
        assert_eq!(&result[0x400..], &rom[0x400..]);
    }

    #[test]
    fn test_erase_zero_size_record_uses_default() {
        let mut stream = Cursor::new(rom_with_record(0, 0));
        erase(&mut stream, 0, DEFAULT_FILL, &mut accept).unwrap();

        let result = stream.into_inner();
        assert!(result[..0x800].iter().all(|&b| b == 0xFF));
        assert_eq!(result[0x800], 0x5A);
    }

    #[test]
    fn test_erase_rejects_fill_before_anything_else() {
        let mut stream = Cursor::new(vec![0u8; 0x100]);
        let err = erase(&mut stream, 0, 256, &mut never).unwrap_err();
        assert!(matches!(err, UcodeError::InvalidArgument(_)));
    }

    #[test]
    fn test_erase_requires_record() {
        let mut stream = Cursor::new(rom_with_record(0x100, 0x300));
        let err = erase(&mut stream, 0x104, 0xFF, &mut never).unwrap_err();
        assert!(matches!(err, UcodeError::RecordNotFound { offset: 0x104, .. }));
    }

    #[test]
    fn test_erase_refused() {
        let rom = rom_with_record(0, 0x100);
        let mut stream = Cursor::new(rom.clone());
        let mut refuse = |_: &PendingWrite| Ok::<_, UcodeError>(false);

        let err = erase(&mut stream, 0, 0xFF, &mut refuse).unwrap_err();
        assert!(matches!(err, UcodeError::Cancelled));
        assert_eq!(stream.into_inner(), rom);
    }

    #[test]
    fn test_erased_record_no_longer_validates() {
        let mut stream = Cursor::new(rom_with_record(0x40, 0x100));
        erase(&mut stream, 0x40, 0x01, &mut accept).unwrap();
        assert!(record::validate(&mut stream, 0x40).unwrap().is_none());
    }
}
