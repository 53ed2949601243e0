//! PE signature, COFF file header and the standard optional-header fields.

use crate::reader::Reader;
use crate::{Error, Result};
use log::warn;

/// PE signature "PE\0\0".
pub const PE_SIGNATURE: u32 = 0x0000_4550;

/// File offset of the legacy stub pointer (DOS `e_lfanew`).
pub const PE_POINTER_OFFSET: u64 = 0x3C;

/// Bytes between the start of the PE header and the optional-header
/// windows fields: signature (4) plus file header (20).
pub const OPTIONAL_HEADER_OFFSET: u64 = 24;

/// PE32 magic number.
pub const PE32_MAGIC: u16 = 0x10B;
/// PE32+ (64-bit) magic number.
pub const PE32PLUS_MAGIC: u16 = 0x20B;

/// The two machine types this crate knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MachineType {
    /// Intel 386 or later.
    I386 = 0x014C,
    /// x64 (AMD64).
    Amd64 = 0x8664,
}

impl MachineType {
    /// Convert from raw u16 value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x014C => Some(Self::I386),
            0x8664 => Some(Self::Amd64),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::I386 => "i386",
            Self::Amd64 => "x86-64",
        }
    }
}

/// Address-space width selected by the optional-header magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitness {
    /// PE32, magic 0x10B.
    Pe32,
    /// PE32+, magic 0x20B.
    Pe32Plus,
}

impl Bitness {
    pub fn from_magic(magic: u16) -> Option<Self> {
        match magic {
            PE32_MAGIC => Some(Self::Pe32),
            PE32PLUS_MAGIC => Some(Self::Pe32Plus),
            _ => None,
        }
    }

    /// Width of an import thunk entry in bytes.
    pub const fn thunk_size(self) -> usize {
        match self {
            Self::Pe32 => 4,
            Self::Pe32Plus => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Pe32 => "PE32",
            Self::Pe32Plus => "PE32+",
        }
    }
}

/// Characteristics flags for the COFF header.
pub mod characteristics {
    /// Relocation info stripped from file.
    pub const RELOCS_STRIPPED: u16 = 0x0001;
    /// File is executable.
    pub const EXECUTABLE_IMAGE: u16 = 0x0002;
    /// App can handle >2GB addresses.
    pub const LARGE_ADDRESS_AWARE: u16 = 0x0020;
    /// 32-bit word machine.
    pub const MACHINE_32BIT: u16 = 0x0100;
    /// Debugging info stripped from file.
    pub const DEBUG_STRIPPED: u16 = 0x0200;
    /// File is a system file.
    pub const SYSTEM: u16 = 0x1000;
    /// File is a DLL.
    pub const DLL: u16 = 0x2000;
}

/// The fixed image header at the PE offset: signature, COFF file header
/// and the bitness-independent leading fields of the optional header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Must equal [`PE_SIGNATURE`].
    pub signature: u32,
    /// Target machine type.
    pub machine: u16,
    /// Number of sections.
    pub number_of_sections: u16,
    /// Timestamp (seconds since epoch).
    pub time_date_stamp: u32,
    /// File offset of COFF symbol table.
    pub pointer_to_symbol_table: u32,
    /// Number of entries in symbol table.
    pub number_of_symbols: u32,
    /// Declared size of the optional header, data directories included.
    pub size_of_optional_header: u16,
    /// Characteristics flags.
    pub characteristics: u16,
    /// Optional header magic; selects bitness.
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
}

impl ImageHeader {
    /// Size of the image header in bytes.
    pub const SIZE: usize = 48;

    /// Parse an image header from a byte slice.
    ///
    /// Fails with [`Error::InvalidMagic`] when the signature is wrong;
    /// `offset` is only used for the error.
    pub fn parse(data: &[u8], offset: u64) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::truncated(
                offset,
                Self::SIZE as u64,
                data.len() as u64,
            ));
        }

        let signature = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if signature != PE_SIGNATURE {
            return Err(Error::InvalidMagic {
                offset,
                found: signature,
            });
        }

        Ok(Self {
            signature,
            machine: u16::from_le_bytes([data[4], data[5]]),
            number_of_sections: u16::from_le_bytes([data[6], data[7]]),
            time_date_stamp: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            pointer_to_symbol_table: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            number_of_symbols: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            size_of_optional_header: u16::from_le_bytes([data[20], data[21]]),
            characteristics: u16::from_le_bytes([data[22], data[23]]),
            magic: u16::from_le_bytes([data[24], data[25]]),
            major_linker_version: data[26],
            minor_linker_version: data[27],
            size_of_code: u32::from_le_bytes([data[28], data[29], data[30], data[31]]),
            size_of_initialized_data: u32::from_le_bytes([data[32], data[33], data[34], data[35]]),
            size_of_uninitialized_data: u32::from_le_bytes([
                data[36], data[37], data[38], data[39],
            ]),
            address_of_entry_point: u32::from_le_bytes([data[40], data[41], data[42], data[43]]),
            base_of_code: u32::from_le_bytes([data[44], data[45], data[46], data[47]]),
        })
    }

    /// Parse an image header from a Reader at the given offset.
    pub fn read_from<R: Reader>(reader: &R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact_at(offset, &mut buf)?;
        let header = Self::parse(&buf, offset)?;
        if header.machine_type().is_none() {
            warn!("unknown machine type {:#06x}", header.machine);
        }
        Ok(header)
    }

    /// Get the machine type as an enum.
    pub fn machine_type(&self) -> Option<MachineType> {
        MachineType::from_u16(self.machine)
    }

    /// Bitness selected by the optional-header magic, if it is a known one.
    pub fn bitness(&self) -> Option<Bitness> {
        Bitness::from_magic(self.magic)
    }

    /// Check if the file is a DLL.
    pub fn is_dll(&self) -> bool {
        self.characteristics & characteristics::DLL != 0
    }

    /// Check if the file is executable.
    pub fn is_executable(&self) -> bool {
        self.characteristics & characteristics::EXECUTABLE_IMAGE != 0
    }
}

/// Read the absolute PE header offset from the legacy stub pointer.
pub fn pe_header_offset<R: Reader>(reader: &R) -> Result<u64> {
    Ok(u64::from(reader.read_u32_at(PE_POINTER_OFFSET)?))
}
