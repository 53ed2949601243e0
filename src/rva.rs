//! Translation between RVAs, file offsets and section-local offsets.

use crate::section::SectionHeader;
use log::trace;

/// Where an RVA lands in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Absolute file offset of the RVA.
    pub file_offset: u64,
    /// Index of the containing section in file order.
    pub section_index: usize,
    /// RVA at which the containing section starts.
    pub section_rva: u32,
    /// Virtual size of the containing section.
    pub section_size: u32,
    /// Offset of the RVA from the start of the section.
    pub section_offset: u32,
}

impl Location {
    /// File offset at which the containing section's bytes start.
    pub fn section_file_offset(&self) -> u64 {
        self.file_offset - u64::from(self.section_offset)
    }
}

/// Find the section containing `rva` and translate it.
///
/// If several sections claim the RVA, the last one in file order wins.
pub fn locate(sections: &[SectionHeader], rva: u32) -> Option<Location> {
    let mut found = None;
    for (index, section) in sections.iter().enumerate() {
        if !section.contains_rva(rva) {
            continue;
        }
        if let Some(Location { section_index, .. }) = found {
            trace!(
                "rva {rva:#x} claimed by sections {section_index} and {index}, keeping {index}"
            );
        }
        let section_offset = rva - section.virtual_address;
        found = Some(Location {
            file_offset: u64::from(section.pointer_to_raw_data) + u64::from(section_offset),
            section_index: index,
            section_rva: section.virtual_address,
            section_size: section.virtual_size,
            section_offset,
        });
    }
    found
}

/// Convert an RVA to a file offset using the section table.
pub fn rva_to_file_offset(sections: &[SectionHeader], rva: u32) -> Option<u64> {
    locate(sections, rva).map(|loc| loc.file_offset)
}

/// Convert a file offset to an RVA using the sections' on-disk ranges.
///
/// Uses the same last-match policy as [`locate`].
pub fn file_offset_to_rva(sections: &[SectionHeader], offset: u64) -> Option<u32> {
    sections
        .iter()
        .rev()
        .find(|s| s.contains_file_offset(offset))
        .and_then(|s| {
            let delta = u32::try_from(offset - u64::from(s.pointer_to_raw_data)).ok()?;
            s.virtual_address.checked_add(delta)
        })
}
