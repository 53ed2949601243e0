//! Export table decoding.
//!
//! Only the layout where every address-table entry has a name is decoded:
//! the export directory's function and name counts must match.

use crate::blob::SectionBlob;
use crate::error::TableError;
use crate::Result;
use log::{debug, trace};

/// IMAGE_EXPORT_DIRECTORY - 40 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportDirectory {
    /// Export flags (reserved, must be 0).
    pub flags: u32,
    /// Time/date stamp.
    pub time_date_stamp: u32,
    /// Major version.
    pub major_version: u16,
    /// Minor version.
    pub minor_version: u16,
    /// RVA to the module name.
    pub name_rva: u32,
    /// Starting ordinal number.
    pub ordinal_base: u32,
    /// Number of entries in the Export Address Table.
    pub number_of_functions: u32,
    /// Number of entries in the Name Pointer Table.
    pub number_of_names: u32,
    /// RVA to the Export Address Table (EAT).
    pub address_table_rva: u32,
    /// RVA to the Export Name Pointer Table.
    pub name_pointer_table_rva: u32,
    /// RVA to the Export Ordinal Table.
    pub ordinal_table_rva: u32,
}

impl ExportDirectory {
    pub const SIZE: usize = 40;

    /// Parse from bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let data = data.get(..Self::SIZE)?;
        Some(Self {
            flags: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            time_date_stamp: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            major_version: u16::from_le_bytes([data[8], data[9]]),
            minor_version: u16::from_le_bytes([data[10], data[11]]),
            name_rva: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            ordinal_base: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            number_of_functions: u32::from_le_bytes([data[20], data[21], data[22], data[23]]),
            number_of_names: u32::from_le_bytes([data[24], data[25], data[26], data[27]]),
            address_table_rva: u32::from_le_bytes([data[28], data[29], data[30], data[31]]),
            name_pointer_table_rva: u32::from_le_bytes([data[32], data[33], data[34], data[35]]),
            ordinal_table_rva: u32::from_le_bytes([data[36], data[37], data[38], data[39]]),
        })
    }

    /// Whether the function and name counts agree.
    pub fn has_supported_layout(&self) -> bool {
        self.number_of_functions == self.number_of_names
    }
}

/// A single exported symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub name: String,
    /// Raw ordinal-table value.
    pub ordinal: u16,
    /// Function RVA from the address table.
    pub rva: u32,
    /// `rva + image_base`.
    pub address: u64,
}

/// The complete export table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportTable {
    /// Export directory header.
    pub directory: ExportDirectory,
    /// Module name.
    pub module_name: String,
    /// Exports in name-pointer-table order.
    pub entries: Vec<ExportEntry>,
}

impl ExportTable {
    /// Decode the export table whose directory sits at `directory_rva`
    /// inside `blob`.
    ///
    /// The address table is indexed by the raw ordinal-table value, without
    /// subtracting `ordinal_base`.
    pub fn parse(blob: &SectionBlob, directory_rva: u32, image_base: u64) -> Result<Self> {
        let dir_bytes = blob.bytes_at(u64::from(directory_rva), ExportDirectory::SIZE)?;
        let directory = ExportDirectory::parse(dir_bytes).unwrap_or_default();
        debug!(
            "export directory at {directory_rva:#x}: {} functions, {} names, base {}",
            directory.number_of_functions, directory.number_of_names, directory.ordinal_base
        );

        if !directory.has_supported_layout() {
            return Err(TableError::UnsupportedExportLayout {
                functions: directory.number_of_functions,
                names: directory.number_of_names,
            }
            .into());
        }

        let module_name = blob.cstr_at(u64::from(directory.name_rva))?;

        let count = directory.number_of_names as usize;
        let mut entries = Vec::with_capacity(count.min(blob.len() / 4));
        for i in 0..u64::from(directory.number_of_names) {
            let ordinal = blob.u16_at(u64::from(directory.ordinal_table_rva) + i * 2)?;
            let name_rva = blob.u32_at(u64::from(directory.name_pointer_table_rva) + i * 4)?;
            let rva =
                blob.u32_at(u64::from(directory.address_table_rva) + u64::from(ordinal) * 4)?;
            let name = blob.cstr_at(u64::from(name_rva))?;
            trace!("export {i}: {name} ordinal {ordinal} rva {rva:#x}");
            entries.push(ExportEntry {
                name,
                ordinal,
                rva,
                address: u64::from(rva).wrapping_add(image_base),
            });
        }

        Ok(Self {
            directory,
            module_name,
            entries,
        })
    }

    /// Check if the export table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an export by name.
    pub fn find_by_name(&self, name: &str) -> Option<&ExportEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Find an export by its raw ordinal-table value.
    pub fn find_by_ordinal(&self, ordinal: u16) -> Option<&ExportEntry> {
        self.entries.iter().find(|e| e.ordinal == ordinal)
    }
}
