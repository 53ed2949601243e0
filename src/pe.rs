//! Analysis context: headers, section table and table walks for one image.

use crate::blob::SectionBlob;
use crate::coff::{pe_header_offset, Bitness, ImageHeader, OPTIONAL_HEADER_OFFSET};
use crate::data_dir::{DataDirectories, DataDirectory, DataDirectoryType, NUMBER_OF_DIRECTORY_ENTRIES};
use crate::error::TableError;
use crate::export::ExportTable;
use crate::import::ImportTable;
use crate::optional::OptionalHeader;
use crate::reader::{FileReader, Reader, SliceReader};
use crate::rva::{self, Location};
use crate::section::SectionHeader;
use crate::{Error, Result};
use log::{debug, warn};
use std::cell::OnceCell;
use std::path::Path;

/// Outcome of one table walk: decoded, or a table-scoped failure.
pub type TableResult<T> = std::result::Result<T, TableError>;

/// Decoded PE headers.
///
/// For an unknown optional-header magic the optional header and data
/// directories are read with the PE32 layout for display only, and are
/// `None` if even that runs past the end of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeHeaders {
    /// Absolute file offset of the PE signature.
    pub pe_offset: u64,
    pub image_header: ImageHeader,
    pub optional_header: Option<OptionalHeader>,
    pub data_directories: Option<DataDirectories>,
}

impl PeHeaders {
    /// Decode the headers from any Reader.
    pub fn read_from<R: Reader>(reader: &R) -> Result<Self> {
        let pe_offset = pe_header_offset(reader)?;
        debug!("PE header @{pe_offset:#x}");

        let image_header = ImageHeader::read_from(reader, pe_offset)?;

        let (optional_header, data_directories) = match image_header.bitness() {
            Some(bitness) => {
                let (optional, dirs) = read_optional(reader, pe_offset, bitness)?;
                debug!(
                    "{} image, base {:#x}, entry point {:#x}",
                    bitness.name(),
                    optional.image_base(),
                    image_header.address_of_entry_point
                );
                (Some(optional), Some(dirs))
            }
            None => {
                warn!("unknown optional header magic {:#06x}", image_header.magic);
                match read_optional(reader, pe_offset, Bitness::Pe32) {
                    Ok((optional, dirs)) => (Some(optional), Some(dirs)),
                    Err(e) => {
                        debug!("optional header not decodable: {e}");
                        (None, None)
                    }
                }
            }
        };

        Ok(Self {
            pe_offset,
            image_header,
            optional_header,
            data_directories,
        })
    }

    /// Decode headers from a byte slice.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Self::read_from(&SliceReader::new(data))
    }

    /// Bitness from the optional-header magic; `None` if it is unknown.
    pub fn bitness(&self) -> Option<Bitness> {
        self.image_header.bitness()
    }

    /// Bitness, or [`Error::UnsupportedImage`] for an unknown magic.
    pub fn require_bitness(&self) -> Result<Bitness> {
        self.bitness().ok_or(Error::UnsupportedImage {
            magic: self.image_header.magic,
        })
    }

    pub fn is_64bit(&self) -> bool {
        self.bitness() == Some(Bitness::Pe32Plus)
    }

    /// Get the image base, if the optional header was decoded.
    pub fn image_base(&self) -> Option<u64> {
        self.optional_header.as_ref().map(OptionalHeader::image_base)
    }

    /// Get the entry point RVA.
    pub fn entry_point(&self) -> u32 {
        self.image_header.address_of_entry_point
    }

    pub fn directory(&self, kind: DataDirectoryType) -> Option<DataDirectory> {
        self.data_directories.as_ref().map(|dirs| dirs.get(kind))
    }

    /// File offset of the section table: after the signature, the file
    /// header and the declared optional-header size.
    pub fn section_table_offset(&self) -> u64 {
        self.pe_offset
            + OPTIONAL_HEADER_OFFSET
            + u64::from(self.image_header.size_of_optional_header)
    }
}

/// Which operations an analysis run performs. Headers are always decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Request {
    pub sections: bool,
    pub imports: bool,
    pub exports: bool,
}

impl Request {
    /// Everything.
    pub fn all() -> Self {
        Self {
            sections: true,
            imports: true,
            exports: true,
        }
    }

    /// Whether anything beyond the headers was asked for.
    pub fn needs_sections(&self) -> bool {
        self.sections || self.imports || self.exports
    }
}

/// Result of one analysis run. Fields are `None` when not requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub headers: PeHeaders,
    pub sections: Option<Vec<SectionHeader>>,
    pub imports: Option<TableResult<ImportTable>>,
    pub exports: Option<TableResult<ExportTable>>,
}

/// One PE image being analyzed.
///
/// Owns the reader for the lifetime of the run. The section table is read
/// on first use and kept.
pub struct PeFile<R: Reader> {
    reader: R,
    headers: PeHeaders,
    sections: OnceCell<Vec<SectionHeader>>,
}

impl PeFile<FileReader> {
    /// Open a PE file on disk and decode its headers.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(FileReader::open(path)?)
    }
}

impl<'a> PeFile<SliceReader<'a>> {
    /// Decode headers from an in-memory image.
    pub fn from_slice(data: &'a [u8]) -> Result<Self> {
        Self::open(SliceReader::new(data))
    }
}

impl<R: Reader> PeFile<R> {
    /// Decode the headers; fails on a bad signature or truncated headers.
    pub fn open(reader: R) -> Result<Self> {
        let headers = PeHeaders::read_from(&reader)?;
        Ok(Self {
            reader,
            headers,
            sections: OnceCell::new(),
        })
    }

    pub fn headers(&self) -> &PeHeaders {
        &self.headers
    }

    pub fn bitness(&self) -> Option<Bitness> {
        self.headers.bitness()
    }

    /// Bitness, or [`Error::UnsupportedImage`] for an unknown magic.
    pub fn require_bitness(&self) -> Result<Bitness> {
        self.headers.require_bitness()
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn into_reader(self) -> R {
        self.reader
    }

    /// The section table in file order.
    pub fn sections(&self) -> Result<&[SectionHeader]> {
        if let Some(sections) = self.sections.get() {
            return Ok(sections);
        }
        self.require_bitness()?;
        let offset = self.headers.section_table_offset();
        let count = self.headers.image_header.number_of_sections as usize;
        let sections = SectionHeader::read_sections(&self.reader, offset, count)?;
        debug!("{count} sections at {offset:#x}");
        Ok(self.sections.get_or_init(|| sections))
    }

    /// Translate an RVA using the section table; `None` if no section maps it.
    pub fn locate(&self, rva: u32) -> Result<Option<Location>> {
        Ok(rva::locate(self.sections()?, rva))
    }

    /// Decode the import table.
    pub fn imports(&self) -> Result<ImportTable> {
        let bitness = self.require_bitness()?;
        let (rva, blob) = self.directory_blob(DataDirectoryType::Import)?;
        let table = ImportTable::parse(&blob, rva, bitness, self.image_base())?;
        debug!(
            "import table: {} modules, {} symbols",
            table.modules.len(),
            table.symbol_count()
        );
        Ok(table)
    }

    /// Decode the export table.
    pub fn exports(&self) -> Result<ExportTable> {
        let (rva, blob) = self.directory_blob(DataDirectoryType::Export)?;
        let table = ExportTable::parse(&blob, rva, self.image_base())?;
        debug!("export table: {} entries", table.entries.len());
        Ok(table)
    }

    /// Run the requested operations. Table-scoped failures are recorded in
    /// the result; anything else aborts the run.
    pub fn analyze(&self, request: &Request) -> Result<Analysis> {
        let sections = if request.sections {
            Some(self.sections()?.to_vec())
        } else {
            None
        };
        let imports = if request.imports {
            Some(table_outcome(self.imports())?)
        } else {
            None
        };
        let exports = if request.exports {
            Some(table_outcome(self.exports())?)
        } else {
            None
        };

        Ok(Analysis {
            headers: self.headers.clone(),
            sections,
            imports,
            exports,
        })
    }

    fn image_base(&self) -> u64 {
        self.headers.image_base().unwrap_or_default()
    }

    /// Locate a directory and load the whole section that holds it.
    fn directory_blob(&self, kind: DataDirectoryType) -> Result<(u32, SectionBlob)> {
        self.require_bitness()?;
        let rva = self
            .headers
            .directory(kind)
            .map(|dir| dir.virtual_address)
            .unwrap_or_default();
        let location = self
            .locate(rva)?
            .ok_or(TableError::NotPresent { table: kind, rva })?;
        let blob = SectionBlob::load(&self.reader, &location)?;
        Ok((rva, blob))
    }
}

/// Windows fields and the 16 data directories that follow the image header.
fn read_optional<R: Reader>(
    reader: &R,
    pe_offset: u64,
    bitness: Bitness,
) -> Result<(OptionalHeader, DataDirectories)> {
    let optional_offset = pe_offset + ImageHeader::SIZE as u64;
    let optional_header = OptionalHeader::read_from(reader, optional_offset, bitness)?;

    let directories_offset = optional_offset + optional_header.size() as u64;
    let data_directories = DataDirectories::read_from(reader, directories_offset)?;

    let declared = optional_header.number_of_rva_and_sizes();
    if (declared as usize) < NUMBER_OF_DIRECTORY_ENTRIES {
        warn!("image declares {declared} data directories, reading all 16");
    }
    Ok((optional_header, data_directories))
}

fn table_outcome<T>(result: Result<T>) -> Result<TableResult<T>> {
    match result {
        Ok(table) => Ok(Ok(table)),
        Err(Error::Table(e)) => {
            debug!("{e}");
            Ok(Err(e))
        }
        Err(e) => Err(e),
    }
}

/// Decode headers and run `request` over `reader` in one go.
pub fn analyze<R: Reader>(reader: R, request: &Request) -> Result<Analysis> {
    PeFile::open(reader)?.analyze(request)
}
