//! In-memory copy of one section, addressed by RVA.
//!
//! Import and export tables refer to their own strings and arrays by RVA,
//! so the walkers load the whole containing section once and resolve
//! everything against it. Every access is checked against the blob length;
//! nothing outside the section is ever touched.

use crate::reader::Reader;
use crate::rva::Location;
use crate::{Error, Result};
use log::debug;

/// Bytes of one section plus the RVA and file offset they start at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBlob {
    data: Vec<u8>,
    base_rva: u32,
    file_offset: u64,
}

impl SectionBlob {
    /// Wrap bytes that start at `base_rva` / `file_offset`.
    pub fn new(data: Vec<u8>, base_rva: u32, file_offset: u64) -> Self {
        Self {
            data,
            base_rva,
            file_offset,
        }
    }

    /// Load the whole section that contains `location`.
    ///
    /// Reads `section_size` bytes from the start of the section; a section
    /// that claims more bytes than the file holds is `TruncatedInput`.
    pub fn load<R: Reader>(reader: &R, location: &Location) -> Result<Self> {
        let file_offset = location.section_file_offset();
        let data = reader.read_bytes_at(file_offset, location.section_size as usize)?;
        debug!(
            "loaded section {} ({:#x} bytes at {:#x}, rva {:#x})",
            location.section_index,
            data.len(),
            file_offset,
            location.section_rva
        );
        Ok(Self::new(data, location.section_rva, file_offset))
    }

    pub fn base_rva(&self) -> u32 {
        self.base_rva
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Everything from `rva` to the end of the section.
    pub fn tail_at(&self, rva: u64) -> Result<&[u8]> {
        self.index_of(rva)
            .map(|start| &self.data[start..])
            .ok_or_else(|| self.out_of_bounds(rva, 1))
    }

    /// Borrow `len` bytes at `rva`.
    ///
    /// `rva` is 64-bit so that values taken from 64-bit thunks can be
    /// checked without truncation.
    pub fn bytes_at(&self, rva: u64, len: usize) -> Result<&[u8]> {
        match self.index_of(rva) {
            Some(start) if self.data.len() - start >= len => Ok(&self.data[start..start + len]),
            _ => Err(self.out_of_bounds(rva, len as u64)),
        }
    }

    pub fn u16_at(&self, rva: u64) -> Result<u16> {
        let b = self.bytes_at(rva, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_at(&self, rva: u64) -> Result<u32> {
        let b = self.bytes_at(rva, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64_at(&self, rva: u64) -> Result<u64> {
        let b = self.bytes_at(rva, 8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read a NUL-terminated string at `rva`.
    ///
    /// The terminator must appear before the end of the blob. Bytes that
    /// are not valid UTF-8 are replaced rather than rejected.
    pub fn cstr_at(&self, rva: u64) -> Result<String> {
        let tail = self.tail_at(rva)?;
        match tail.iter().position(|&b| b == 0) {
            Some(end) => Ok(String::from_utf8_lossy(&tail[..end]).into_owned()),
            None => Err(self.out_of_bounds(rva, tail.len() as u64 + 1)),
        }
    }

    /// Blob index of `rva`; the end of the blob is a valid index.
    fn index_of(&self, rva: u64) -> Option<usize> {
        rva.checked_sub(u64::from(self.base_rva))
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i <= self.data.len())
    }

    /// RVAs below the section report the section's own file offset.
    fn out_of_bounds(&self, rva: u64, needed: u64) -> Error {
        match rva.checked_sub(u64::from(self.base_rva)) {
            Some(index) => Error::truncated(
                self.file_offset.saturating_add(index),
                needed,
                (self.data.len() as u64).saturating_sub(index),
            ),
            None => Error::truncated(self.file_offset, needed, 0),
        }
    }
}
