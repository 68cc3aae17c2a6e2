//! Forward-only record scanner.
//!
//! Probes are cheap: one byte is peeked and full header validation only runs
//! when it is the signature byte. The cursor moves in [`FINE_STEP`]s until
//! the first record is found, then in [`COARSE_STEP`]s on the assumption that
//! padding between records is aligned to large boundaries. A record that
//! starts off that grid is not found; this trades a small accuracy risk for
//! a ~64x cut in probes on multi-megabyte images.

use crate::error::Result;
use crate::io::stream_len;
use crate::record::{self, MicrocodeRecord, SIGNATURE_BYTE};
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use tracing::{debug, warn};

/// Stride before any record has been found.
pub const FINE_STEP: u64 = 0x04;

/// Stride once at least one record has been found.
pub const COARSE_STEP: u64 = 0x100;

/// A record together with the unrecognised bytes preceding it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub gap_before: Option<Range<u64>>,
    pub record: MicrocodeRecord,
}

pub struct RecordScanner<'a, R> {
    stream: &'a mut R,
    cursor: u64,
    end: u64,
    last_end: u64,
    found_any: bool,
    failed: bool,
    probes: u64,
}

impl<'a, R: Read + Seek> RecordScanner<'a, R> {
    /// Scans `[start, end)`. A start past the end yields an empty scan.
    pub fn new(stream: &'a mut R, start: u64, end: u64) -> Self {
        let start = start.min(end);
        Self {
            stream,
            cursor: start,
            end,
            last_end: start,
            found_any: false,
            failed: false,
            probes: 0,
        }
    }

    /// Scans from `start` to the end of the stream.
    pub fn until_eof(stream: &'a mut R, start: u64) -> Result<Self> {
        let end = stream_len(stream)?;
        Ok(Self::new(stream, start, end))
    }

    #[inline]
    pub fn probes(&self) -> u64 {
        self.probes
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.failed || self.cursor >= self.end
    }

    /// The unknown region between the last record and the end of the range.
    ///
    /// Only meaningful once the iterator is exhausted; returns `None` before
    /// that, and when the last record reaches (or runs past) the end.
    pub fn trailing_gap(&self) -> Option<Range<u64>> {
        if !self.is_finished() || self.last_end >= self.end {
            return None;
        }
        Some(self.last_end..self.end)
    }

    #[inline]
    fn step(&self) -> u64 {
        if self.found_any { COARSE_STEP } else { FINE_STEP }
    }

    fn probe(&mut self) -> Result<Option<MicrocodeRecord>> {
        self.probes += 1;

        self.stream.seek(SeekFrom::Start(self.cursor))?;
        let mut peek = [0u8; 1];
        if self.stream.read(&mut peek)? == 0 || peek[0] != SIGNATURE_BYTE {
            return Ok(None);
        }

        record::validate(self.stream, self.cursor)
    }
}

impl<R: Read + Seek> Iterator for RecordScanner<'_, R> {
    type Item = Result<ScanEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while self.cursor < self.end {
            match self.probe() {
                Ok(Some(record)) => {
                    let gap_before =
                        (self.cursor != self.last_end).then(|| self.last_end..self.cursor);

                    debug!(
                        position = record.position,
                        size = record.size,
                        cpuid = record.cpuid,
                        "record found"
                    );
                    if record.end() > self.end {
                        warn!(
                            position = record.position,
                            end = record.end(),
                            range_end = self.end,
                            "record runs past the end of the scanned range"
                        );
                    }

                    self.cursor = record.end();
                    self.last_end = self.cursor;
                    self.found_any = true;

                    return Some(Ok(ScanEntry { gap_before, record }));
                }
                Ok(None) => self.cursor += self.step(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }

        None
    }
}
