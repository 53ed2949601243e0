//! Synthetic PE images for integration tests.

#![allow(dead_code)]

use peinfo::DataDirectoryType;

pub const PE_OFFSET: u32 = 0x80;
pub const HEADERS_SIZE: u32 = 0x400;
pub const FILE_ALIGNMENT: u32 = 0x200;
pub const SECTION_ALIGNMENT: u32 = 0x1000;

/// Section contents addressed by RVA.
pub struct SectionData {
    base: u32,
    data: Vec<u8>,
}

impl SectionData {
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    pub fn put(&mut self, rva: u32, bytes: &[u8]) -> &mut Self {
        let at = (rva - self.base) as usize;
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn put_u16(&mut self, rva: u32, value: u16) -> &mut Self {
        self.put(rva, &value.to_le_bytes())
    }

    pub fn put_u32(&mut self, rva: u32, value: u32) -> &mut Self {
        self.put(rva, &value.to_le_bytes())
    }

    pub fn put_u64(&mut self, rva: u32, value: u64) -> &mut Self {
        self.put(rva, &value.to_le_bytes())
    }

    pub fn put_cstr(&mut self, rva: u32, s: &str) -> &mut Self {
        self.put(rva, s.as_bytes());
        self.put(rva + s.len() as u32, &[0])
    }

    /// Hint/name entry: u16 hint followed by the name.
    pub fn put_hint_name(&mut self, rva: u32, hint: u16, name: &str) -> &mut Self {
        self.put_u16(rva, hint);
        self.put_cstr(rva + 2, name)
    }

    /// 20-byte import descriptor.
    pub fn put_import_descriptor(&mut self, rva: u32, name_rva: u32, thunk_rva: u32) -> &mut Self {
        self.put_u32(rva, 0);
        self.put_u32(rva + 4, 0);
        self.put_u32(rva + 8, 0);
        self.put_u32(rva + 12, name_rva);
        self.put_u32(rva + 16, thunk_rva)
    }

    /// 40-byte export directory.
    pub fn put_export_directory(&mut self, rva: u32, dir: &ExportLayout) -> &mut Self {
        self.put_u32(rva, 0);
        self.put_u32(rva + 4, 0);
        self.put_u16(rva + 8, 0);
        self.put_u16(rva + 10, 0);
        self.put_u32(rva + 12, dir.name_rva);
        self.put_u32(rva + 16, dir.ordinal_base);
        self.put_u32(rva + 20, dir.functions);
        self.put_u32(rva + 24, dir.names);
        self.put_u32(rva + 28, dir.address_table_rva);
        self.put_u32(rva + 32, dir.name_pointer_table_rva);
        self.put_u32(rva + 36, dir.ordinal_table_rva)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Export directory fields the tests care about.
pub struct ExportLayout {
    pub name_rva: u32,
    pub ordinal_base: u32,
    pub functions: u32,
    pub names: u32,
    pub address_table_rva: u32,
    pub name_pointer_table_rva: u32,
    pub ordinal_table_rva: u32,
}

struct TestSection {
    name: [u8; 8],
    rva: u32,
    virtual_size: u32,
    data: Vec<u8>,
    characteristics: u32,
}

/// Builds a PE32 or PE32+ image with the given sections and directories.
///
/// The first section's raw data starts at file offset 0x400; following
/// sections are packed at 0x200 alignment.
pub struct ImageBuilder {
    signature: u32,
    magic: u16,
    machine: u16,
    image_base: u64,
    entry_point: u32,
    number_of_rva_and_sizes: u32,
    directories: [(u32, u32); 16],
    sections: Vec<TestSection>,
}

impl ImageBuilder {
    pub fn pe32() -> Self {
        Self {
            signature: 0x0000_4550,
            magic: 0x10B,
            machine: 0x14C,
            image_base: 0x0040_0000,
            entry_point: 0x1000,
            number_of_rva_and_sizes: 16,
            directories: [(0, 0); 16],
            sections: Vec::new(),
        }
    }

    pub fn pe32plus() -> Self {
        Self {
            magic: 0x20B,
            machine: 0x8664,
            image_base: 0x1_4000_0000,
            ..Self::pe32()
        }
    }

    pub fn signature(mut self, signature: u32) -> Self {
        self.signature = signature;
        self
    }

    pub fn magic(mut self, magic: u16) -> Self {
        self.magic = magic;
        self
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn image_base(mut self, image_base: u64) -> Self {
        self.image_base = image_base;
        self
    }

    pub fn entry_point(mut self, rva: u32) -> Self {
        self.entry_point = rva;
        self
    }

    pub fn number_of_rva_and_sizes(mut self, count: u32) -> Self {
        self.number_of_rva_and_sizes = count;
        self
    }

    pub fn directory(mut self, kind: DataDirectoryType, rva: u32, size: u32) -> Self {
        self.directories[kind.as_index()] = (rva, size);
        self
    }

    /// Add a section whose virtual size equals its data length.
    pub fn section(self, name: &str, rva: u32, data: Vec<u8>) -> Self {
        let virtual_size = data.len() as u32;
        self.section_with_size(name, rva, virtual_size, data)
    }

    pub fn section_with_size(mut self, name: &str, rva: u32, virtual_size: u32, data: Vec<u8>) -> Self {
        let mut raw_name = [0u8; 8];
        let len = name.len().min(8);
        raw_name[..len].copy_from_slice(&name.as_bytes()[..len]);
        self.sections.push(TestSection {
            name: raw_name,
            rva,
            virtual_size,
            data,
            characteristics: 0x4000_0040,
        });
        self
    }

    fn is_64bit(&self) -> bool {
        self.magic == 0x20B
    }

    fn optional_size(&self) -> u32 {
        let windows = if self.is_64bit() { 88 } else { 72 };
        24 + windows + 128
    }

    /// File offset of the section table.
    pub fn section_table_offset(&self) -> u32 {
        PE_OFFSET + 24 + self.optional_size()
    }

    /// File offset at which section `index` stores its raw data.
    pub fn raw_offset(&self, index: usize) -> u32 {
        let mut offset = HEADERS_SIZE;
        for section in &self.sections[..index] {
            offset += align(section.data.len() as u32, FILE_ALIGNMENT);
        }
        offset
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; HEADERS_SIZE as usize];
        out[0..2].copy_from_slice(b"MZ");
        put_u32(&mut out, 0x3C, PE_OFFSET);

        let mut at = PE_OFFSET as usize;
        // COFF file header
        put_u32(&mut out, at, self.signature);
        put_u16(&mut out, at + 4, self.machine);
        put_u16(&mut out, at + 6, self.sections.len() as u16);
        put_u32(&mut out, at + 8, 0x5F00_0000);
        put_u16(&mut out, at + 20, self.optional_size() as u16);
        put_u16(&mut out, at + 22, 0x0102);
        // Standard fields
        put_u16(&mut out, at + 24, self.magic);
        out[at + 26] = 14;
        put_u32(&mut out, at + 40, self.entry_point);
        put_u32(&mut out, at + 44, 0x1000);
        at += 48;

        // Windows fields
        let size_of_image = self
            .sections
            .iter()
            .map(|s| align(s.rva + s.virtual_size, SECTION_ALIGNMENT))
            .max()
            .unwrap_or(SECTION_ALIGNMENT);
        if self.is_64bit() {
            put_u64(&mut out, at, self.image_base);
            at += 8;
        } else {
            put_u32(&mut out, at, 0x2000);
            put_u32(&mut out, at + 4, self.image_base as u32);
            at += 8;
        }
        put_u32(&mut out, at, SECTION_ALIGNMENT);
        put_u32(&mut out, at + 4, FILE_ALIGNMENT);
        put_u16(&mut out, at + 8, 6);
        put_u16(&mut out, at + 16, 6);
        put_u32(&mut out, at + 24, size_of_image);
        put_u32(&mut out, at + 28, HEADERS_SIZE);
        put_u16(&mut out, at + 36, 3);
        let tail = if self.is_64bit() { at + 76 } else { at + 60 };
        put_u32(&mut out, tail, self.number_of_rva_and_sizes);
        at = tail + 4;

        for (rva, size) in self.directories {
            put_u32(&mut out, at, rva);
            put_u32(&mut out, at + 4, size);
            at += 8;
        }
        assert_eq!(at as u32, self.section_table_offset());

        for (index, section) in self.sections.iter().enumerate() {
            out[at..at + 8].copy_from_slice(&section.name);
            put_u32(&mut out, at + 8, section.virtual_size);
            put_u32(&mut out, at + 12, section.rva);
            put_u32(&mut out, at + 16, align(section.data.len() as u32, FILE_ALIGNMENT));
            put_u32(&mut out, at + 20, self.raw_offset(index));
            put_u32(&mut out, at + 36, section.characteristics);
            at += 40;
        }

        for section in &self.sections {
            let padded = align(section.data.len() as u32, FILE_ALIGNMENT) as usize;
            let start = out.len();
            out.extend_from_slice(&section.data);
            out.resize(start + padded, 0);
        }
        out
    }
}

fn align(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

fn put_u16(out: &mut [u8], at: usize, value: u16) {
    out[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut [u8], at: usize, value: u32) {
    out[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut [u8], at: usize, value: u64) {
    out[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

/// `.idata` at RVA 0x1000 importing two symbols from KERNEL32.dll, with the
/// descriptor array at 0x1010. PE32 thunks.
pub fn kernel32_imports() -> SectionData {
    let mut idata = SectionData::new(0x1000, 0x1000);
    idata
        .put_import_descriptor(0x1010, 0x1100, 0x1080)
        .put_u32(0x1080, 0x1200)
        .put_u32(0x1084, 0x1210)
        .put_cstr(0x1100, "KERNEL32.dll")
        .put_hint_name(0x1200, 0x0115, "ExitProcess")
        .put_hint_name(0x1210, 0x02A0, "GetStdHandle");
    idata
}

/// `.edata` at `base` exporting `names` (all named, address table in the
/// same order).
pub fn named_exports(base: u32, module: &str, names: &[&str]) -> SectionData {
    let count = names.len() as u32;
    let mut edata = SectionData::new(base, 0x1000);
    edata.put_export_directory(
        base,
        &ExportLayout {
            name_rva: base + 0x800,
            ordinal_base: 1,
            functions: count,
            names: count,
            address_table_rva: base + 0x100,
            name_pointer_table_rva: base + 0x200,
            ordinal_table_rva: base + 0x300,
        },
    );
    edata.put_cstr(base + 0x800, module);
    let mut string_rva = base + 0x400;
    for (i, name) in names.iter().enumerate() {
        let i = i as u32;
        edata
            .put_u32(base + 0x100 + i * 4, 0x1000 + i * 0x10)
            .put_u32(base + 0x200 + i * 4, string_rva)
            .put_u16(base + 0x300 + i * 2, i as u16)
            .put_cstr(string_rva, name);
        string_rva += name.len() as u32 + 1;
    }
    edata
}
