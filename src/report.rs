//! Whole-image scan report: found records interleaved with the unknown
//! regions between them, closed by one end-of-file event.

use crate::error::Result;
use crate::record::MicrocodeRecord;
use crate::scanner::RecordScanner;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Seek};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Record(MicrocodeRecord),
    /// Unknown region before a record. `end` is inclusive.
    Gap { start: u64, end: u64, length: u64 },
    /// Unknown region running to end of file. `end` is inclusive.
    TrailingGap { start: u64, end: u64, length: u64 },
    /// The last record ends exactly at end of file.
    NoTrailingGap,
}

impl ScanEvent {
    fn gap(range: Range<u64>) -> Self {
        ScanEvent::Gap {
            start: range.start,
            end: range.end - 1,
            length: range.end - range.start,
        }
    }

    fn trailing(range: Range<u64>) -> Self {
        ScanEvent::TrailingGap {
            start: range.start,
            end: range.end - 1,
            length: range.end - range.start,
        }
    }
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanEvent::Record(record) => fmt::Display::fmt(record, f),
            ScanEvent::Gap { start, end, length } => write!(
                f,
                "\tUnknown region: 0x{:X} to 0x{:X} (0x{:X} bytes)",
                start, end, length
            ),
            ScanEvent::TrailingGap { start, end, length } => write!(
                f,
                "\tUnknown region through end of file: 0x{:X} to 0x{:X} (0x{:X} bytes)",
                start, end, length
            ),
            ScanEvent::NoTrailingGap => f.write_str("\tNo unknown region at end of file"),
        }
    }
}

/// Turns a scan from some offset to end of file into display events.
pub struct ScanReporter<'a, R> {
    scanner: RecordScanner<'a, R>,
    queued: Option<ScanEvent>,
    done: bool,
}

impl<'a, R: Read + Seek> ScanReporter<'a, R> {
    pub fn new(stream: &'a mut R, start_offset: u64) -> Result<Self> {
        Ok(Self {
            scanner: RecordScanner::until_eof(stream, start_offset)?,
            queued: None,
            done: false,
        })
    }
}

impl<R: Read + Seek> Iterator for ScanReporter<'_, R> {
    type Item = Result<ScanEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.queued.take() {
            return Some(Ok(event));
        }
        if self.done {
            return None;
        }

        match self.scanner.next() {
            Some(Ok(entry)) => {
                let record = ScanEvent::Record(entry.record);
                match entry.gap_before {
                    Some(gap) => {
                        self.queued = Some(record);
                        Some(Ok(ScanEvent::gap(gap)))
                    }
                    None => Some(Ok(record)),
                }
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                Some(Ok(match self.scanner.trailing_gap() {
                    Some(gap) => ScanEvent::trailing(gap),
                    None => ScanEvent::NoTrailingGap,
                }))
            }
        }
    }
}

/// Collects the full report for `stream` starting at `start_offset`.
pub fn report<R: Read + Seek>(stream: &mut R, start_offset: u64) -> Result<Vec<ScanEvent>> {
    ScanReporter::new(stream, start_offset)?.collect()
}
