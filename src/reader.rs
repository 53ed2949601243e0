//! Positioned byte sources for the decoders.

use crate::{Error, Result};
use std::cell::RefCell;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Random-access input for PE decoding.
///
/// This is the only I/O primitive the decoders use. Every fixed-size read
/// either returns exactly the requested bytes or fails with
/// [`Error::TruncatedInput`].
pub trait Reader {
    /// Fill as much of `buf` as the source has from `offset` on and return
    /// the count. A short count means end of input.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total length of the source, when it is known up front.
    fn size(&self) -> Option<u64>;

    /// Fill all of `buf` or fail with `TruncatedInput`.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let got = self.read_at(offset, buf)?;
        if got != buf.len() {
            return Err(Error::truncated(offset, buf.len() as u64, got as u64));
        }
        Ok(())
    }

    /// Fixed-size read into an array.
    fn read_array_at<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.read_exact_at(offset, &mut out)?;
        Ok(out)
    }

    fn read_u16_at(&self, offset: u64) -> Result<u16> {
        self.read_array_at(offset).map(u16::from_le_bytes)
    }

    fn read_u32_at(&self, offset: u64) -> Result<u32> {
        self.read_array_at(offset).map(u32::from_le_bytes)
    }

    fn read_u64_at(&self, offset: u64) -> Result<u64> {
        self.read_array_at(offset).map(u64::from_le_bytes)
    }

    /// Read `len` bytes into a new buffer.
    ///
    /// When the source size is known, a length reaching past the end is
    /// rejected before anything is allocated.
    fn read_bytes_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if let Some(size) = self.size() {
            let available = size.saturating_sub(offset);
            if len as u64 > available {
                return Err(Error::truncated(offset, len as u64, available));
            }
        }
        let mut out = vec![0u8; len];
        self.read_exact_at(offset, &mut out)?;
        Ok(out)
    }
}

/// An image already in memory.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        self.data
    }
}

impl Reader for SliceReader<'_> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let Ok(offset) = usize::try_from(offset) else {
            return Ok(0);
        };
        let tail = self.data.get(offset..).unwrap_or_default();
        let n = buf.len().min(tail.len());
        buf[..n].copy_from_slice(&tail[..n]);
        Ok(n)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// An image on disk. Every read seeks first; nothing is cached.
pub struct FileReader {
    file: RefCell<File>,
    size: u64,
}

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(file)
    }

    pub fn new(mut file: File) -> Result<Self> {
        let size = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file: RefCell::new(file),
            size,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.size
    }
}

impl Reader for FileReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))?;
        // A single read() may return early; keep going until EOF or full.
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }
}
