use crate::error::{ImageRole, Result, UcodeError};
use memmap2::Mmap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Read-only view of an image file.
///
/// Memory-mapped when possible so the scanner's many small probes are plain
/// slice accesses; falls back to a buffered reader for files that cannot be
/// mapped (empty files, some special files).
pub enum Image {
    Mapped(Cursor<Mmap>),
    Buffered(BufReader<File>),
}

impl Image {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| not_found_or_io(path, e))?;

        if file.metadata()?.len() > 0 {
            // SAFETY: the map is read-only and dropped with the operation;
            // concurrent modification of the image is unsupported.
            if let Ok(mmap) = unsafe { Mmap::map(&file) } {
                return Ok(Image::Mapped(Cursor::new(mmap)));
            }
        }

        Ok(Image::Buffered(BufReader::new(file)))
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        matches!(self, Image::Mapped(_))
    }
}

impl Read for Image {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Image::Mapped(c) => c.read(buf),
            Image::Buffered(r) => r.read(buf),
        }
    }
}

impl Seek for Image {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Image::Mapped(c) => c.seek(pos),
            Image::Buffered(r) => r.seek(pos),
        }
    }
}

/// Opens an existing image for in-place modification. Never truncates.
pub fn open_writable(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| not_found_or_io(path, e))
}

/// Total length of a stream; the position is left unchanged.
pub fn stream_len<S: Seek>(stream: &mut S) -> io::Result<u64> {
    let original = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    if original != len {
        stream.seek(SeekFrom::Start(original))?;
    }
    Ok(len)
}

/// Reads exactly `len` bytes at `offset` into an owned buffer.
///
/// Fails with `InsufficientData` before reading anything if the stream is
/// too short.
pub fn read_exact_at<R: Read + Seek>(
    stream: &mut R,
    offset: u64,
    len: u64,
    image: ImageRole,
) -> Result<Vec<u8>> {
    let available = stream_len(stream)?.saturating_sub(offset);
    if available < len {
        return Err(UcodeError::InsufficientData {
            image,
            offset,
            needed: len,
            available,
        });
    }

    let mut buffer = vec![0u8; len as usize];
    stream.seek(SeekFrom::Start(offset))?;
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}

fn not_found_or_io(path: &Path, e: io::Error) -> UcodeError {
    if e.kind() == io::ErrorKind::NotFound {
        UcodeError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        UcodeError::Io(e)
    }
}
