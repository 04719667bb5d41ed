//! ELF file header decoding.
//!
//! The 32- and 64-bit layouts are decoded into distinct structs right after
//! the class byte is read; nothing downstream reinterprets raw bytes.

use crate::ElfError;

/// `\x7fELF`
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;

const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

/// Upper bound on the bytes we are willing to allocate for a section table.
pub const MAX_SECTION_TABLE_BYTES: usize = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Elf32,
    Elf64,
}

impl Class {
    /// Size of the file header for this class.
    pub const fn header_size(self) -> usize {
        match self {
            Class::Elf32 => 52,
            Class::Elf64 => 64,
        }
    }

    /// Size of one section-header entry for this class.
    pub const fn section_entry_size(self) -> usize {
        match self {
            Class::Elf32 => 40,
            Class::Elf64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Little/big-endian field access over a byte slice whose length was checked
/// by the caller.
#[derive(Clone, Copy)]
pub(crate) struct Fields<'a> {
    bytes: &'a [u8],
    endian: Endian,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self { bytes, endian }
    }

    fn array<const N: usize>(&self, at: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[at..at + N]);
        out
    }

    pub(crate) fn u16(&self, at: usize) -> u16 {
        match self.endian {
            Endian::Little => u16::from_le_bytes(self.array(at)),
            Endian::Big => u16::from_be_bytes(self.array(at)),
        }
    }

    pub(crate) fn u32(&self, at: usize) -> u32 {
        match self.endian {
            Endian::Little => u32::from_le_bytes(self.array(at)),
            Endian::Big => u32::from_be_bytes(self.array(at)),
        }
    }

    pub(crate) fn u64(&self, at: usize) -> u64 {
        match self.endian {
            Endian::Little => u64::from_le_bytes(self.array(at)),
            Endian::Big => u64::from_be_bytes(self.array(at)),
        }
    }
}

/// Fields of an `Elf32_Ehdr` the gate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header32 {
    pub endian: Endian,
    pub e_type: u16,
    pub e_machine: u16,
    pub e_shoff: u32,
    pub e_shentsize: u16,
    pub e_shnum: u16,
}

/// Fields of an `Elf64_Ehdr` the gate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header64 {
    pub endian: Endian,
    pub e_type: u16,
    pub e_machine: u16,
    pub e_shoff: u64,
    pub e_shentsize: u16,
    pub e_shnum: u16,
}

/// A sanity-checked ELF header, class resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfHeader {
    Elf32(Header32),
    Elf64(Header64),
}

impl ElfHeader {
    pub fn class(&self) -> Class {
        match self {
            ElfHeader::Elf32(_) => Class::Elf32,
            ElfHeader::Elf64(_) => Class::Elf64,
        }
    }

    pub fn endian(&self) -> Endian {
        match self {
            ElfHeader::Elf32(h) => h.endian,
            ElfHeader::Elf64(h) => h.endian,
        }
    }

    /// File offset of the section-header table.
    pub fn section_table_offset(&self) -> u64 {
        match self {
            ElfHeader::Elf32(h) => u64::from(h.e_shoff),
            ElfHeader::Elf64(h) => h.e_shoff,
        }
    }

    pub fn section_count(&self) -> usize {
        match self {
            ElfHeader::Elf32(h) => usize::from(h.e_shnum),
            ElfHeader::Elf64(h) => usize::from(h.e_shnum),
        }
    }

    /// Bytes occupied by the whole section-header table.
    ///
    /// Bounded by [`MAX_SECTION_TABLE_BYTES`] once the header has been parsed.
    pub fn section_table_len(&self) -> usize {
        self.section_count() * self.class().section_entry_size()
    }
}

/// Decodes the header prefix read from the start of a file.
///
/// `Ok(None)` means "not ELF": fewer than four bytes or a magic mismatch.
/// Anything carrying the magic but failing a sanity check is an error.
pub(crate) fn parse(prefix: &[u8]) -> Result<Option<ElfHeader>, ElfError> {
    if prefix.len() < ELF_MAGIC.len() || prefix[..ELF_MAGIC.len()] != ELF_MAGIC {
        return Ok(None);
    }
    if prefix.len() <= EI_DATA {
        return Err(ElfError::TruncatedHeader {
            needed: EI_DATA + 1,
            found: prefix.len(),
        });
    }

    let class = match prefix[EI_CLASS] {
        ELFCLASS32 => Class::Elf32,
        ELFCLASS64 => Class::Elf64,
        other => return Err(ElfError::BadClass(other)),
    };
    let endian = match prefix[EI_DATA] {
        ELFDATA2LSB => Endian::Little,
        ELFDATA2MSB => Endian::Big,
        other => return Err(ElfError::BadEncoding(other)),
    };
    if prefix.len() < class.header_size() {
        return Err(ElfError::TruncatedHeader {
            needed: class.header_size(),
            found: prefix.len(),
        });
    }

    let f = Fields::new(prefix, endian);
    let header = match class {
        Class::Elf32 => ElfHeader::Elf32(Header32 {
            endian,
            e_type: f.u16(16),
            e_machine: f.u16(18),
            e_shoff: f.u32(32),
            e_shentsize: f.u16(46),
            e_shnum: f.u16(48),
        }),
        Class::Elf64 => ElfHeader::Elf64(Header64 {
            endian,
            e_type: f.u16(16),
            e_machine: f.u16(18),
            e_shoff: f.u64(40),
            e_shentsize: f.u16(58),
            e_shnum: f.u16(60),
        }),
    };

    sanity_check(&header)?;
    Ok(Some(header))
}

/// Rejects headers whose section-table description cannot be trusted for an
/// allocation.
fn sanity_check(header: &ElfHeader) -> Result<(), ElfError> {
    if header.section_table_offset() == 0 {
        return Err(ElfError::NoSectionTable);
    }

    let expected = header.class().section_entry_size();
    let found = match header {
        ElfHeader::Elf32(h) => usize::from(h.e_shentsize),
        ElfHeader::Elf64(h) => usize::from(h.e_shentsize),
    };
    if found != expected {
        return Err(ElfError::EntrySize { found, expected });
    }

    if header.section_count() > MAX_SECTION_TABLE_BYTES / expected {
        return Err(ElfError::TooManySections(header.section_count()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header64(shoff: u64, shentsize: u16, shnum: u16) -> Vec<u8> {
        let mut h = vec![0u8; 64];
        h[..4].copy_from_slice(&ELF_MAGIC);
        h[EI_CLASS] = ELFCLASS64;
        h[EI_DATA] = ELFDATA2LSB;
        h[40..48].copy_from_slice(&shoff.to_le_bytes());
        h[58..60].copy_from_slice(&shentsize.to_le_bytes());
        h[60..62].copy_from_slice(&shnum.to_le_bytes());
        h
    }

    fn header32(shoff: u32, shentsize: u16, shnum: u16) -> Vec<u8> {
        let mut h = vec![0u8; 52];
        h[..4].copy_from_slice(&ELF_MAGIC);
        h[EI_CLASS] = ELFCLASS32;
        h[EI_DATA] = ELFDATA2MSB;
        h[32..36].copy_from_slice(&shoff.to_be_bytes());
        h[46..48].copy_from_slice(&shentsize.to_be_bytes());
        h[48..50].copy_from_slice(&shnum.to_be_bytes());
        h
    }

    #[test]
    fn test_not_elf() {
        assert_eq!(parse(b"#!/bin/sh\necho hi\n").unwrap(), None);
        assert_eq!(parse(b"\x7fEL").unwrap(), None);
        assert_eq!(parse(b"").unwrap(), None);
    }

    #[test]
    fn test_parse_64_little_endian() {
        let parsed = parse(&header64(4096, 64, 5)).unwrap().unwrap();
        assert_eq!(parsed.class(), Class::Elf64);
        assert_eq!(parsed.endian(), Endian::Little);
        assert_eq!(parsed.section_table_offset(), 4096);
        assert_eq!(parsed.section_table_len(), 5 * 64);
    }

    #[test]
    fn test_parse_32_big_endian() {
        let parsed = parse(&header32(0x200, 40, 3)).unwrap().unwrap();
        assert_eq!(parsed.class(), Class::Elf32);
        assert_eq!(parsed.section_table_offset(), 0x200);
        assert_eq!(parsed.section_count(), 3);
    }

    #[test]
    fn test_missing_section_table() {
        assert!(matches!(
            parse(&header64(0, 64, 3)),
            Err(ElfError::NoSectionTable)
        ));
    }

    #[test]
    fn test_wrong_entry_size() {
        assert!(matches!(
            parse(&header64(4096, 40, 3)),
            Err(ElfError::EntrySize {
                found: 40,
                expected: 64
            })
        ));
    }

    #[test]
    fn test_section_count_bound() {
        // 1024 * 64 == 65536 is the largest accepted table.
        assert!(parse(&header64(4096, 64, 1024)).is_ok());
        assert!(matches!(
            parse(&header64(4096, 64, 1025)),
            Err(ElfError::TooManySections(1025))
        ));
    }

    #[test]
    fn test_section_count_bound_32() {
        // 1638 * 40 == 65520; one more entry crosses 64 KiB.
        let parsed = parse(&header32(0x200, 40, 1638)).unwrap().unwrap();
        assert_eq!(parsed.section_table_len(), 65520);
        assert!(matches!(
            parse(&header32(0x200, 40, 1639)),
            Err(ElfError::TooManySections(1639))
        ));
    }

    #[test]
    fn test_bad_class_and_truncation() {
        let mut h = header64(4096, 64, 1);
        h[EI_CLASS] = 7;
        assert!(matches!(parse(&h), Err(ElfError::BadClass(7))));

        let h = header64(4096, 64, 1);
        assert!(matches!(
            parse(&h[..30]),
            Err(ElfError::TruncatedHeader {
                needed: 64,
                found: 30
            })
        ));
    }
}
