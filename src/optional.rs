//! Bitness-specific optional header fields.
//!
//! The leading standard fields (magic, linker version, code sizes, entry
//! point) live in [`ImageHeader`](crate::coff::ImageHeader). What follows
//! here differs between PE32 and PE32+ in the width of the image base and
//! the stack/heap fields, and PE32 carries an extra `base_of_data`.

use crate::coff::Bitness;
use crate::reader::Reader;
use crate::{Error, Result};

/// Windows subsystem values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Subsystem {
    Unknown = 0,
    Native = 1,
    WindowsGui = 2,
    WindowsCui = 3,
    Os2Cui = 5,
    PosixCui = 7,
    NativeWindows = 8,
    WindowsCeGui = 9,
    EfiApplication = 10,
    EfiBootServiceDriver = 11,
    EfiRuntimeDriver = 12,
    EfiRom = 13,
    Xbox = 14,
    WindowsBootApplication = 16,
}

impl Subsystem {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Unknown),
            1 => Some(Self::Native),
            2 => Some(Self::WindowsGui),
            3 => Some(Self::WindowsCui),
            5 => Some(Self::Os2Cui),
            7 => Some(Self::PosixCui),
            8 => Some(Self::NativeWindows),
            9 => Some(Self::WindowsCeGui),
            10 => Some(Self::EfiApplication),
            11 => Some(Self::EfiBootServiceDriver),
            12 => Some(Self::EfiRuntimeDriver),
            13 => Some(Self::EfiRom),
            14 => Some(Self::Xbox),
            16 => Some(Self::WindowsBootApplication),
            _ => None,
        }
    }
}

/// Little-endian field cursor over a buffer whose length was already checked.
struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }
}

/// PE32 windows-specific fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalHeader32 {
    pub base_of_data: u32,
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
}

/// PE32+ windows-specific fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalHeader64 {
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
}

/// Optional header for either bitness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalHeader {
    Pe32(OptionalHeader32),
    Pe32Plus(OptionalHeader64),
}

impl OptionalHeader32 {
    pub const SIZE: usize = 72;

    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut f = Fields::new(data.get(..Self::SIZE)?);
        Some(Self {
            base_of_data: f.u32(),
            image_base: f.u32(),
            section_alignment: f.u32(),
            file_alignment: f.u32(),
            major_operating_system_version: f.u16(),
            minor_operating_system_version: f.u16(),
            major_image_version: f.u16(),
            minor_image_version: f.u16(),
            major_subsystem_version: f.u16(),
            minor_subsystem_version: f.u16(),
            win32_version_value: f.u32(),
            size_of_image: f.u32(),
            size_of_headers: f.u32(),
            check_sum: f.u32(),
            subsystem: f.u16(),
            dll_characteristics: f.u16(),
            size_of_stack_reserve: f.u32(),
            size_of_stack_commit: f.u32(),
            size_of_heap_reserve: f.u32(),
            size_of_heap_commit: f.u32(),
            loader_flags: f.u32(),
            number_of_rva_and_sizes: f.u32(),
        })
    }
}

impl OptionalHeader64 {
    pub const SIZE: usize = 88;

    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut f = Fields::new(data.get(..Self::SIZE)?);
        Some(Self {
            image_base: f.u64(),
            section_alignment: f.u32(),
            file_alignment: f.u32(),
            major_operating_system_version: f.u16(),
            minor_operating_system_version: f.u16(),
            major_image_version: f.u16(),
            minor_image_version: f.u16(),
            major_subsystem_version: f.u16(),
            minor_subsystem_version: f.u16(),
            win32_version_value: f.u32(),
            size_of_image: f.u32(),
            size_of_headers: f.u32(),
            check_sum: f.u32(),
            subsystem: f.u16(),
            dll_characteristics: f.u16(),
            size_of_stack_reserve: f.u64(),
            size_of_stack_commit: f.u64(),
            size_of_heap_reserve: f.u64(),
            size_of_heap_commit: f.u64(),
            loader_flags: f.u32(),
            number_of_rva_and_sizes: f.u32(),
        })
    }
}

impl OptionalHeader {
    /// On-disk size of the fields for the given bitness.
    pub const fn size_for(bitness: Bitness) -> usize {
        match bitness {
            Bitness::Pe32 => OptionalHeader32::SIZE,
            Bitness::Pe32Plus => OptionalHeader64::SIZE,
        }
    }

    /// Parse the variant selected by `bitness`; `offset` is only used for errors.
    pub fn parse(data: &[u8], bitness: Bitness, offset: u64) -> Result<Self> {
        let parsed = match bitness {
            Bitness::Pe32 => OptionalHeader32::parse(data).map(Self::Pe32),
            Bitness::Pe32Plus => OptionalHeader64::parse(data).map(Self::Pe32Plus),
        };
        parsed.ok_or_else(|| {
            Error::truncated(
                offset,
                Self::size_for(bitness) as u64,
                data.len() as u64,
            )
        })
    }

    /// Parse an optional header from a Reader at the given offset.
    pub fn read_from<R: Reader>(reader: &R, offset: u64, bitness: Bitness) -> Result<Self> {
        let data = reader.read_bytes_at(offset, Self::size_for(bitness))?;
        Self::parse(&data, bitness, offset)
    }

    pub fn bitness(&self) -> Bitness {
        match self {
            Self::Pe32(_) => Bitness::Pe32,
            Self::Pe32Plus(_) => Bitness::Pe32Plus,
        }
    }

    pub fn size(&self) -> usize {
        Self::size_for(self.bitness())
    }

    /// Get the image base address.
    pub fn image_base(&self) -> u64 {
        match self {
            Self::Pe32(h) => u64::from(h.image_base),
            Self::Pe32Plus(h) => h.image_base,
        }
    }

    pub fn section_alignment(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.section_alignment,
            Self::Pe32Plus(h) => h.section_alignment,
        }
    }

    pub fn file_alignment(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.file_alignment,
            Self::Pe32Plus(h) => h.file_alignment,
        }
    }

    pub fn size_of_image(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.size_of_image,
            Self::Pe32Plus(h) => h.size_of_image,
        }
    }

    pub fn size_of_headers(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.size_of_headers,
            Self::Pe32Plus(h) => h.size_of_headers,
        }
    }

    pub fn subsystem(&self) -> u16 {
        match self {
            Self::Pe32(h) => h.subsystem,
            Self::Pe32Plus(h) => h.subsystem,
        }
    }

    /// Operating system version as `(major, minor)`.
    pub fn os_version(&self) -> (u16, u16) {
        match self {
            Self::Pe32(h) => (
                h.major_operating_system_version,
                h.minor_operating_system_version,
            ),
            Self::Pe32Plus(h) => (
                h.major_operating_system_version,
                h.minor_operating_system_version,
            ),
        }
    }

    /// Subsystem version as `(major, minor)`.
    pub fn subsystem_version(&self) -> (u16, u16) {
        match self {
            Self::Pe32(h) => (h.major_subsystem_version, h.minor_subsystem_version),
            Self::Pe32Plus(h) => (h.major_subsystem_version, h.minor_subsystem_version),
        }
    }

    /// Declared number of data directories. Informational only; the table
    /// is always decoded with 16 slots.
    pub fn number_of_rva_and_sizes(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.number_of_rva_and_sizes,
            Self::Pe32Plus(h) => h.number_of_rva_and_sizes,
        }
    }
}
