//! Section Header structures and parsing.

use crate::reader::Reader;
use crate::{Error, Result};
use std::borrow::Cow;

/// Section characteristics flags.
pub mod characteristics {
    /// Section contains executable code.
    pub const CODE: u32 = 0x00000020;
    /// Section contains initialized data.
    pub const INITIALIZED_DATA: u32 = 0x00000040;
    /// Section contains uninitialized data.
    pub const UNINITIALIZED_DATA: u32 = 0x00000080;
    /// Section can be discarded.
    pub const DISCARDABLE: u32 = 0x02000000;
    /// Section is shared.
    pub const SHARED: u32 = 0x10000000;
    /// Section is executable.
    pub const EXECUTE: u32 = 0x20000000;
    /// Section is readable.
    pub const READ: u32 = 0x40000000;
    /// Section is writable.
    pub const WRITE: u32 = 0x80000000;
}

/// Section Header (IMAGE_SECTION_HEADER).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Section name: 8 raw bytes, NUL-padded but not necessarily NUL-terminated.
    pub name: [u8; 8],
    /// Virtual size of the section.
    pub virtual_size: u32,
    /// RVA of the section.
    pub virtual_address: u32,
    /// Size of raw data on disk.
    pub size_of_raw_data: u32,
    /// File offset to raw data.
    pub pointer_to_raw_data: u32,
    /// File offset to relocations.
    pub pointer_to_relocations: u32,
    /// File offset to line numbers.
    pub pointer_to_linenumbers: u32,
    /// Number of relocations.
    pub number_of_relocations: u16,
    /// Number of line numbers.
    pub number_of_linenumbers: u16,
    /// Section characteristics.
    pub characteristics: u32,
}

impl SectionHeader {
    /// Size of a section header in bytes.
    pub const SIZE: usize = 40;

    /// Parse a section header from a byte slice; `offset` is only used for errors.
    pub fn parse(data: &[u8], offset: u64) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::truncated(
                offset,
                Self::SIZE as u64,
                data.len() as u64,
            ));
        }

        let mut name = [0u8; 8];
        name.copy_from_slice(&data[0..8]);

        Ok(Self {
            name,
            virtual_size: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            virtual_address: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            size_of_raw_data: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            pointer_to_raw_data: u32::from_le_bytes([data[20], data[21], data[22], data[23]]),
            pointer_to_relocations: u32::from_le_bytes([data[24], data[25], data[26], data[27]]),
            pointer_to_linenumbers: u32::from_le_bytes([data[28], data[29], data[30], data[31]]),
            number_of_relocations: u16::from_le_bytes([data[32], data[33]]),
            number_of_linenumbers: u16::from_le_bytes([data[34], data[35]]),
            characteristics: u32::from_le_bytes([data[36], data[37], data[38], data[39]]),
        })
    }

    /// Section name bounded at the first NUL or at 8 bytes.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        &self.name[..end]
    }

    /// Section name for display. Invalid UTF-8 is replaced, never rejected.
    pub fn name_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    /// Exclusive end of the section's virtual range.
    pub fn virtual_end(&self) -> u64 {
        u64::from(self.virtual_address) + u64::from(self.virtual_size)
    }

    /// Whether `rva` falls in `[virtual_address, virtual_address + virtual_size)`.
    pub fn contains_rva(&self, rva: u32) -> bool {
        rva >= self.virtual_address && u64::from(rva) < self.virtual_end()
    }

    /// Whether the file `offset` falls inside the section's on-disk bytes.
    pub fn contains_file_offset(&self, offset: u64) -> bool {
        let start = u64::from(self.pointer_to_raw_data);
        offset >= start && offset < start + u64::from(self.size_of_raw_data)
    }

    /// Check if the section is executable.
    pub fn is_executable(&self) -> bool {
        self.characteristics & characteristics::EXECUTE != 0
    }

    /// Check if the section is readable.
    pub fn is_readable(&self) -> bool {
        self.characteristics & characteristics::READ != 0
    }

    /// Check if the section is writable.
    pub fn is_writable(&self) -> bool {
        self.characteristics & characteristics::WRITE != 0
    }

    /// Parse a section header from a Reader at the given offset.
    pub fn read_from<R: Reader>(reader: &R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact_at(offset, &mut buf)?;
        Self::parse(&buf, offset)
    }

    /// Read `count` consecutive section headers, in file order.
    pub fn read_sections<R: Reader>(reader: &R, offset: u64, count: usize) -> Result<Vec<Self>> {
        let table_size = (count * Self::SIZE) as u64;
        if let Some(size) = reader.size() {
            let available = size.saturating_sub(offset);
            if table_size > available {
                return Err(Error::truncated(offset, table_size, available));
            }
        }

        let mut sections = Vec::with_capacity(count);
        for i in 0..count {
            let section_offset = offset + (i * Self::SIZE) as u64;
            sections.push(Self::read_from(reader, section_offset)?);
        }
        Ok(sections)
    }
}
