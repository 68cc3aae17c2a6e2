use crate::error::{ImageRole, Result, UcodeError};
use crate::io::read_exact_at;
use crate::record::{self, MicrocodeRecord};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub record: MicrocodeRecord,
    pub path: PathBuf,
}

/// Copies the record starting exactly at `offset` into its own file.
///
/// Without a destination the file is named after the record, see
/// [`generate_filename`]. The source is never modified.
pub fn extract<R: Read + Seek>(
    source: &mut R,
    offset: u64,
    destination: Option<&Path>,
) -> Result<Extracted> {
    let record = record::require(source, offset, ImageRole::Rom)?;
    let data = read_exact_at(source, offset, record.size, ImageRole::Rom)?;

    let path = match destination {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(generate_filename(&record)),
    };

    write_destination(&path, &data)?;

    info!(
        position = record.position,
        size = record.size,
        path = %path.display(),
        "record extracted"
    );

    Ok(Extracted { record, path })
}

pub fn generate_filename(record: &MicrocodeRecord) -> String {
    format!(
        "cpu{:05X}_plat{:02X}_rev{:04X}.bin",
        record.cpuid, record.platform, record.revision
    )
}

fn write_destination(path: &Path, data: &[u8]) -> Result<()> {
    let unwritable = |source| UcodeError::DestinationUnwritable {
        path: path.to_path_buf(),
        source,
    };

    let mut out = File::create(path).map_err(unwritable)?;
    out.write_all(data).map_err(unwritable)?;
    out.sync_all().map_err(unwritable)?;
    Ok(())
}
