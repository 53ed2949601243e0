//! # peinfo
//!
//! A read-only decoder for Windows PE (Portable Executable) images.
//!
//! Decodes the PE headers, the section table, and the import and export
//! tables of PE32 and PE32+ images. Input comes through the [`Reader`]
//! trait, so a file on disk and an in-memory buffer are handled the same
//! way.
//!
//! ## Features
//!
//! - **Headers only**: [`PeHeaders`] decodes the header block without
//!   touching the rest of the file.
//! - **Bounded walks**: import and export tables are decoded from a copy of
//!   their containing section; every read is range-checked against it.
//! - **Per-table failures**: a missing or unsupported table is reported in
//!   the [`Analysis`] without aborting the run.
//!
//! ## Example
//!
//! ```no_run
//! use peinfo::{PeFile, Request};
//!
//! let pe = PeFile::from_file("example.dll").unwrap();
//! println!("Entry point: {:#x}", pe.headers().entry_point());
//!
//! let analysis = pe.analyze(&Request::all()).unwrap();
//! if let Some(Ok(exports)) = &analysis.exports {
//!     for entry in &exports.entries {
//!         println!("{} @ {:#x}", entry.name, entry.address);
//!     }
//! }
//! ```

pub mod blob;
pub mod coff;
pub mod data_dir;
pub mod error;
pub mod export;
pub mod import;
pub mod optional;
pub mod pe;
pub mod reader;
pub mod rva;
pub mod section;

pub use blob::SectionBlob;
pub use coff::{Bitness, ImageHeader, MachineType};
pub use data_dir::{DataDirectories, DataDirectory, DataDirectoryType};
pub use error::{Error, Result, TableError};
pub use export::{ExportDirectory, ExportEntry, ExportTable};
pub use import::{ImportDescriptor, ImportTable, ImportThunk, ImportedModule, ImportedSymbol};
pub use optional::{OptionalHeader, Subsystem};
pub use pe::{analyze, Analysis, PeFile, PeHeaders, Request, TableResult};
pub use reader::{FileReader, Reader, SliceReader};
pub use rva::Location;
pub use section::SectionHeader;
