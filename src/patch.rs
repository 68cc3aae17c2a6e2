use crate::confirm::{ConfirmGate, PendingWrite, WriteKind};
use crate::error::{ImageRole, Result, UcodeError};
use crate::io::{read_exact_at, stream_len};
use crate::record::{self, MicrocodeRecord};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patched {
    pub offset: u64,
    /// What was overwritten; `None` when forced over a non-record.
    pub previous: Option<MicrocodeRecord>,
    pub incoming: MicrocodeRecord,
}

/// Overwrites the record at `rom_offset` with the record found at
/// `update_offset` in `update`.
///
/// Every check runs before the gate is consulted, so a refused or failed
/// patch leaves the ROM untouched. `force` only relaxes the check on the
/// ROM side; the incoming record must always be valid and complete.
/// Exactly the incoming record's effective size is copied.
pub fn patch<W, R, G>(
    rom: &mut W,
    rom_offset: u64,
    update: &mut R,
    update_offset: u64,
    force: bool,
    gate: &mut G,
) -> Result<Patched>
where
    W: Read + Write + Seek,
    R: Read + Seek,
    G: ConfirmGate + ?Sized,
{
    rom.seek(SeekFrom::Start(rom_offset))?;
    update.seek(SeekFrom::Start(update_offset))?;

    let previous = match record::require(rom, rom_offset, ImageRole::Rom) {
        Ok(found) => Some(found),
        Err(UcodeError::RecordNotFound { .. }) if force => {
            warn!(rom_offset, "no valid record in ROM, forcing patch");
            None
        }
        Err(e) => return Err(e),
    };

    let incoming = record::require(update, update_offset, ImageRole::Update)?;
    let data = read_exact_at(update, update_offset, incoming.size, ImageRole::Update)?;

    let actual = rom.stream_position()?;
    if actual != rom_offset {
        return Err(UcodeError::IntegrityError {
            expected: rom_offset,
            actual,
        });
    }

    let rom_len = stream_len(rom)?;
    if rom_offset + incoming.size > rom_len {
        warn!(
            rom_offset,
            size = incoming.size,
            rom_len,
            "patch extends past the end of the ROM image"
        );
    }
    if let Some(old) = previous.filter(|old| old.size != incoming.size) {
        warn!(
            old_size = old.size,
            new_size = incoming.size,
            "incoming record size differs from the one it replaces"
        );
    }

    let pending = PendingWrite {
        offset: rom_offset,
        length: incoming.size,
        existing: previous,
        kind: WriteKind::Patch { incoming },
    };
    if !gate.confirm(&pending)? {
        return Err(UcodeError::Cancelled);
    }

    rom.seek(SeekFrom::Start(rom_offset))?;
    rom.write_all(&data)?;
    rom.flush()?;

    info!(
        rom_offset,
        update_offset,
        size = incoming.size,
        cpuid = incoming.cpuid,
        revision = incoming.revision,
        "record patched"
    );

    Ok(Patched {
        offset: rom_offset,
        previous,
        incoming,
    })
}
