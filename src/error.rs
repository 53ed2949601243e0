//! Error types for PE decoding.

use crate::data_dir::DataDirectoryType;
use std::io;
use thiserror::Error;

/// Result type alias for peinfo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding a PE image.
///
/// Everything except [`Error::Table`] is structural: the analysis stops and
/// no partially decoded structure is handed out.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Fewer bytes available than a structure or table requires.
    #[error("truncated input at offset {offset:#x}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        offset: u64,
        needed: u64,
        available: u64,
    },
    /// The PE signature is not "PE\0\0".
    #[error("bad magic at offset {offset:#x}: found {found:#010x}, expected 0x00004550 ('PE\\0\\0')")]
    InvalidMagic { offset: u64, found: u32 },
    /// Optional header magic is neither PE32 nor PE32+.
    #[error("unsupported image: optional header magic {magic:#06x}")]
    UnsupportedImage { magic: u16 },
    /// A requested table could not be decoded; the rest of the image is fine.
    #[error(transparent)]
    Table(#[from] TableError),
}

impl Error {
    pub(crate) fn truncated(offset: u64, needed: u64, available: u64) -> Self {
        Error::TruncatedInput {
            offset,
            needed,
            available,
        }
    }

    /// Whether this error aborts the whole analysis.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Table(_))
    }
}

/// Table-scoped failures. These are reported per table and never abort
/// the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// The directory RVA is not covered by any section.
    #[error("can't find {} table: RVA {rva:#x} is not mapped by any section", table.name())]
    NotPresent { table: DataDirectoryType, rva: u32 },
    /// Export address and name-pointer counts differ.
    #[error("unsupported export table ({functions:x}!={names:x})")]
    UnsupportedExportLayout { functions: u32, names: u32 },
}
