//! Import table decoding.
//!
//! The import directory is an array of [`ImportDescriptor`]s ending with a
//! descriptor whose name RVA is zero. Each descriptor points at a thunk
//! array that ends with a zero entry. Neither array has a stored length,
//! so both are walked lazily and bounded by the containing section.

use crate::blob::SectionBlob;
use crate::coff::Bitness;
use crate::{Error, Result};
use log::{debug, trace};

/// High bit of a PE32 thunk: import by ordinal.
pub const ORDINAL_FLAG_32: u32 = 0x8000_0000;
/// High bit of a PE32+ thunk: import by ordinal.
pub const ORDINAL_FLAG_64: u64 = 0x8000_0000_0000_0000;

/// One 20-byte import directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportDescriptor {
    /// Import flags; on modern linkers this slot holds the lookup-table RVA.
    pub flags: u32,
    /// Timestamp (0 if not bound).
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    /// RVA of the module name (NUL-terminated ASCII).
    pub name_rva: u32,
    /// RVA of the thunk array that is walked.
    pub thunk_rva: u32,
}

impl ImportDescriptor {
    pub const SIZE: usize = 20;

    /// Parse from bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let data = data.get(..Self::SIZE)?;
        Some(Self {
            flags: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            time_date_stamp: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            major_version: u16::from_le_bytes([data[8], data[9]]),
            minor_version: u16::from_le_bytes([data[10], data[11]]),
            name_rva: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            thunk_rva: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
        })
    }

    /// A zero name RVA ends the descriptor array.
    pub fn is_terminator(&self) -> bool {
        self.name_rva == 0
    }
}

/// How a symbol is imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportThunk {
    /// Import by ordinal: the raw entry with its high bit cleared.
    Ordinal(u64),
    /// Import by name (hint, name).
    Name { hint: u16, name: String },
}

impl ImportThunk {
    /// Check if a PE32 entry imports by ordinal.
    pub fn is_ordinal_entry_32(value: u32) -> bool {
        value & ORDINAL_FLAG_32 != 0
    }

    /// Check if a PE32+ entry imports by ordinal.
    pub fn is_ordinal_entry_64(value: u64) -> bool {
        value & ORDINAL_FLAG_64 != 0
    }

    /// Decode a raw, non-zero thunk value, reading the hint/name pair from
    /// `blob` for name imports.
    pub fn decode(blob: &SectionBlob, value: u64, bitness: Bitness) -> Result<Self> {
        let ordinal = match bitness {
            Bitness::Pe32 => {
                let value = value as u32;
                Self::is_ordinal_entry_32(value).then_some(u64::from(value & !ORDINAL_FLAG_32))
            }
            Bitness::Pe32Plus => {
                Self::is_ordinal_entry_64(value).then_some(value & !ORDINAL_FLAG_64)
            }
        };
        if let Some(ordinal) = ordinal {
            return Ok(Self::Ordinal(ordinal));
        }

        let hint = blob.u16_at(value)?;
        let name = blob.cstr_at(value + 2)?;
        Ok(Self::Name { hint, name })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name { name, .. } => Some(name),
            Self::Ordinal(_) => None,
        }
    }
}

/// One decoded thunk with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSymbol {
    /// RVA of the thunk slot.
    pub thunk_rva: u32,
    /// `thunk_rva + image_base`.
    pub address: u64,
    pub thunk: ImportThunk,
}

/// A single imported module with its symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedModule {
    /// The module name.
    pub name: String,
    pub descriptor: ImportDescriptor,
    /// Imported symbols in thunk-array order.
    pub symbols: Vec<ImportedSymbol>,
}

/// The complete import table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportTable {
    /// Imported modules in descriptor order.
    pub modules: Vec<ImportedModule>,
}

/// Lazy walk over the descriptor array, stopping at the terminator.
///
/// Yields an error and stops if the section ends before a terminator.
pub struct Descriptors<'a> {
    blob: &'a SectionBlob,
    next_rva: u64,
    done: bool,
}

impl<'a> Descriptors<'a> {
    pub fn new(blob: &'a SectionBlob, directory_rva: u32) -> Self {
        Self {
            blob,
            next_rva: u64::from(directory_rva),
            done: false,
        }
    }
}

impl Iterator for Descriptors<'_> {
    type Item = Result<ImportDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let descriptor = match self.blob.bytes_at(self.next_rva, ImportDescriptor::SIZE) {
            Ok(bytes) => ImportDescriptor::parse(bytes)?,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if descriptor.is_terminator() {
            self.done = true;
            return None;
        }
        self.next_rva += ImportDescriptor::SIZE as u64;
        Some(Ok(descriptor))
    }
}

/// Lazy walk over one thunk array, yielding `(thunk_rva, raw_value)` until
/// a zero entry.
pub struct Thunks<'a> {
    blob: &'a SectionBlob,
    bitness: Bitness,
    next_rva: u64,
    done: bool,
}

impl<'a> Thunks<'a> {
    pub fn new(blob: &'a SectionBlob, thunk_rva: u32, bitness: Bitness) -> Self {
        Self {
            blob,
            bitness,
            next_rva: u64::from(thunk_rva),
            done: false,
        }
    }

    fn read_entry(&self) -> Result<(u32, u64)> {
        let value = match self.bitness {
            Bitness::Pe32 => u64::from(self.blob.u32_at(self.next_rva)?),
            Bitness::Pe32Plus => self.blob.u64_at(self.next_rva)?,
        };
        let rva = u32::try_from(self.next_rva).map_err(|_| {
            Error::truncated(self.next_rva, self.bitness.thunk_size() as u64, 0)
        })?;
        Ok((rva, value))
    }
}

impl Iterator for Thunks<'_> {
    type Item = Result<(u32, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_entry() {
            Ok((_, 0)) => {
                self.done = true;
                None
            }
            Ok(entry) => {
                self.next_rva += self.bitness.thunk_size() as u64;
                Some(Ok(entry))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl ImportTable {
    /// Decode the import table starting at `directory_rva` inside `blob`.
    pub fn parse(
        blob: &SectionBlob,
        directory_rva: u32,
        bitness: Bitness,
        image_base: u64,
    ) -> Result<Self> {
        let mut modules = Vec::new();

        for descriptor in Descriptors::new(blob, directory_rva) {
            let descriptor = descriptor?;
            let name = blob.cstr_at(u64::from(descriptor.name_rva))?;
            let symbols = Self::read_symbols(blob, &descriptor, bitness, image_base)?;
            debug!("import module {name}: {} symbols", symbols.len());
            modules.push(ImportedModule {
                name,
                descriptor,
                symbols,
            });
        }

        Ok(Self { modules })
    }

    fn read_symbols(
        blob: &SectionBlob,
        descriptor: &ImportDescriptor,
        bitness: Bitness,
        image_base: u64,
    ) -> Result<Vec<ImportedSymbol>> {
        let mut symbols = Vec::new();
        for entry in Thunks::new(blob, descriptor.thunk_rva, bitness) {
            let (thunk_rva, value) = entry?;
            let thunk = ImportThunk::decode(blob, value, bitness)?;
            trace!("thunk {thunk_rva:#x}: {value:#x} -> {thunk:?}");
            symbols.push(ImportedSymbol {
                thunk_rva,
                address: u64::from(thunk_rva).wrapping_add(image_base),
                thunk,
            });
        }
        Ok(symbols)
    }

    /// Check if the import table is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Find a module by name (case-insensitive).
    pub fn find_module(&self, name: &str) -> Option<&ImportedModule> {
        self.modules
            .iter()
            .find(|module| module.name.eq_ignore_ascii_case(name))
    }

    /// Get total count of imported symbols.
    pub fn symbol_count(&self) -> usize {
        self.modules.iter().map(|module| module.symbols.len()).sum()
    }
}
