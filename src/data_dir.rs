//! Data directory table.

use crate::reader::Reader;
use crate::{Error, Result};

/// Data directory slot, by position in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum DataDirectoryType {
    /// Export table (.edata)
    Export = 0,
    /// Import table (.idata)
    Import = 1,
    /// Resource table (.rsrc)
    Resource = 2,
    /// Exception table (.pdata)
    Exception = 3,
    /// Certificate table
    Security = 4,
    /// Base relocation table (.reloc)
    BaseReloc = 5,
    /// Debug directory
    Debug = 6,
    /// Architecture-specific data
    Architecture = 7,
    /// Global pointer register value
    GlobalPtr = 8,
    /// Thread local storage (.tls)
    Tls = 9,
    /// Load configuration
    LoadConfig = 10,
    /// Bound import table
    BoundImport = 11,
    /// Import address table
    Iat = 12,
    /// Delay import descriptor
    DelayImport = 13,
    /// CLR runtime header
    ClrRuntime = 14,
    /// Reserved
    Reserved = 15,
}

impl DataDirectoryType {
    const ALL: [Self; NUMBER_OF_DIRECTORY_ENTRIES] = [
        Self::Export,
        Self::Import,
        Self::Resource,
        Self::Exception,
        Self::Security,
        Self::BaseReloc,
        Self::Debug,
        Self::Architecture,
        Self::GlobalPtr,
        Self::Tls,
        Self::LoadConfig,
        Self::BoundImport,
        Self::Iat,
        Self::DelayImport,
        Self::ClrRuntime,
        Self::Reserved,
    ];

    pub const fn as_index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Export => "Export",
            Self::Import => "Import",
            Self::Resource => "Resource",
            Self::Exception => "Exception",
            Self::Security => "Certificate",
            Self::BaseReloc => "BaseReloc",
            Self::Debug => "Debug",
            Self::Architecture => "Architecture",
            Self::GlobalPtr => "GlobalPtr",
            Self::Tls => "TLS",
            Self::LoadConfig => "LoadConfig",
            Self::BoundImport => "BoundImport",
            Self::Iat => "IAT",
            Self::DelayImport => "DelayImport",
            Self::ClrRuntime => "CLR",
            Self::Reserved => "Reserved",
        }
    }

    /// All slots in file order.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter()
    }
}

/// Number of data directory slots; always decoded in full.
pub const NUMBER_OF_DIRECTORY_ENTRIES: usize = 16;

/// Data Directory entry (IMAGE_DATA_DIRECTORY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    /// RVA of the table.
    pub virtual_address: u32,
    /// Size of the table in bytes.
    pub size: u32,
}

impl DataDirectory {
    /// Size of a data directory entry in bytes.
    pub const SIZE: usize = 8;

    /// Parse a data directory from a byte slice.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let bytes = data.get(..Self::SIZE)?;
        Some(Self {
            virtual_address: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    /// Check if this directory entry is present (non-zero).
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 || self.size != 0
    }
}

/// The fixed 16-slot data directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectories {
    entries: [DataDirectory; NUMBER_OF_DIRECTORY_ENTRIES],
}

impl DataDirectories {
    /// Size of the whole table in bytes.
    pub const SIZE: usize = NUMBER_OF_DIRECTORY_ENTRIES * DataDirectory::SIZE;

    pub fn new(entries: [DataDirectory; NUMBER_OF_DIRECTORY_ENTRIES]) -> Self {
        Self { entries }
    }

    /// Parse the table from a byte slice; `offset` is only used for errors.
    pub fn parse(data: &[u8], offset: u64) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::truncated(
                offset,
                Self::SIZE as u64,
                data.len() as u64,
            ));
        }
        let mut entries = [DataDirectory::default(); NUMBER_OF_DIRECTORY_ENTRIES];
        for (entry, chunk) in entries
            .iter_mut()
            .zip(data.chunks_exact(DataDirectory::SIZE))
        {
            *entry = DataDirectory::parse(chunk).unwrap_or_default();
        }
        Ok(Self { entries })
    }

    /// Read the table from a Reader at the given offset.
    pub fn read_from<R: Reader>(reader: &R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact_at(offset, &mut buf)?;
        Self::parse(&buf, offset)
    }

    pub fn get(&self, kind: DataDirectoryType) -> DataDirectory {
        self.entries[kind.as_index()]
    }

    pub fn export(&self) -> DataDirectory {
        self.get(DataDirectoryType::Export)
    }

    pub fn import(&self) -> DataDirectory {
        self.get(DataDirectoryType::Import)
    }

    pub fn entries(&self) -> &[DataDirectory; NUMBER_OF_DIRECTORY_ENTRIES] {
        &self.entries
    }

    /// Iterate over `(slot, entry)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (DataDirectoryType, DataDirectory)> + '_ {
        DataDirectoryType::all().zip(self.entries.iter().copied())
    }
}
