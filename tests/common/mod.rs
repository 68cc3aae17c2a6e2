#![allow(dead_code)]

use std::io::Write;
use tempfile::NamedTempFile;

pub const MARKER: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub revision: u16,
    pub cpuid: u32,
    pub platform: u8,
    pub size: u16,
}

impl Header {
    pub fn new(cpuid: u32, size: u16) -> Self {
        Self {
            revision: 0x21,
            cpuid,
            platform: 0x12,
            size,
        }
    }

    pub fn effective_size(&self) -> usize {
        if self.size == 0 { 0x800 } else { self.size as usize }
    }

    /// Writes the header at `at` and fills the rest of the record body with
    /// a position-dependent pattern that never contains a marker.
    pub fn write_into(&self, image: &mut [u8], at: usize) {
        let end = (at + self.effective_size()).min(image.len());
        for (i, b) in image[at..end].iter_mut().enumerate() {
            *b = 0x80 | (i as u8 & 0x7F);
        }
        image[at..at + 0x30].fill(0);
        image[at..at + 4].copy_from_slice(&MARKER);
        image[at + 0x04..at + 0x06].copy_from_slice(&self.revision.to_le_bytes());
        image[at + 0x0C..at + 0x10].copy_from_slice(&self.cpuid.to_le_bytes());
        image[at + 0x14..at + 0x18].copy_from_slice(&MARKER);
        image[at + 0x18] = self.platform;
        image[at + 0x20..at + 0x22].copy_from_slice(&self.size.to_le_bytes());
    }
}

pub fn temp_image(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}
