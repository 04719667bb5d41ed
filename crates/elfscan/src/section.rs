//! Section-header table decoding and signature-section lookup.

use crate::header::{Class, ElfHeader, Fields};
use common::{SHT_DIGSIG, SIG_RECORD_SIZE};
use std::ops::Range;

/// The parts of a section header needed to find the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub sh_type: u32,
    pub sh_offset: u64,
    pub sh_size: u64,
}

/// Decodes `table` (exactly `header.section_table_len()` bytes).
pub(crate) fn parse_table(header: &ElfHeader, table: &[u8]) -> Vec<SectionHeader> {
    let class = header.class();
    let entry = class.section_entry_size();
    table
        .chunks_exact(entry)
        .map(|raw| {
            let f = Fields::new(raw, header.endian());
            match class {
                Class::Elf32 => SectionHeader {
                    sh_type: f.u32(4),
                    sh_offset: u64::from(f.u32(16)),
                    sh_size: u64::from(f.u32(20)),
                },
                Class::Elf64 => SectionHeader {
                    sh_type: f.u32(4),
                    sh_offset: f.u64(24),
                    sh_size: f.u64(32),
                },
            }
        })
        .collect()
}

/// Returns the first signature section, if its declared size is exactly one
/// record. A wrongly sized section counts as absent.
pub(crate) fn find_signature_section(sections: &[SectionHeader]) -> Option<&SectionHeader> {
    let found = sections.iter().find(|s| s.sh_type == SHT_DIGSIG)?;
    if found.sh_size != SIG_RECORD_SIZE as u64 {
        log::debug!(
            "signature section has size {} (expected {}), ignoring",
            found.sh_size,
            SIG_RECORD_SIZE
        );
        return None;
    }
    Some(found)
}

/// The embedded signature record and where it lives in the file.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureSection {
    /// Absolute file offset of the record.
    pub offset: u64,
    pub record: [u8; SIG_RECORD_SIZE],
}

impl SignatureSection {
    /// Byte range `[offset, offset + SIG_RECORD_SIZE)` to zero while hashing.
    pub fn region(&self) -> Range<u64> {
        self.offset..self.offset + SIG_RECORD_SIZE as u64
    }
}

impl std::fmt::Debug for SignatureSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureSection")
            .field("offset", &self.offset)
            .field("len", &self.record.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(sh_type: u32, sh_size: u64) -> SectionHeader {
        SectionHeader {
            sh_type,
            sh_offset: 0x400,
            sh_size,
        }
    }

    #[test]
    fn test_finds_exact_size() {
        let table = [section(1, 10), section(SHT_DIGSIG, 512), section(3, 7)];
        let found = find_signature_section(&table).unwrap();
        assert_eq!(found.sh_offset, 0x400);
    }

    #[test]
    fn test_wrong_size_is_absent() {
        let table = [section(SHT_DIGSIG, 511)];
        assert!(find_signature_section(&table).is_none());
        let table = [section(SHT_DIGSIG, 1 << 40)];
        assert!(find_signature_section(&table).is_none());
    }

    #[test]
    fn test_no_signature_section() {
        assert!(find_signature_section(&[section(1, 512)]).is_none());
        assert!(find_signature_section(&[]).is_none());
    }
}
