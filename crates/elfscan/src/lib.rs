//! # ElfScan: Signature Section Locator
//!
//! Finds the fixed-size signature record embedded in an ELF32/ELF64 file
//! without trusting any size the file declares before it has been checked.
//!
//! ## Outcomes
//! - [`Scan::NotElf`]: no ELF magic. Not our concern; callers permit.
//! - [`Scan::Unsigned`]: a sane ELF file without a correctly sized
//!   signature section.
//! - [`Scan::Signed`]: the record bytes plus their absolute file offset.
//! - `Err(ElfError)`: malformed headers/tables or I/O failure (including
//!   any short read). Callers deny.
//!
//! ## Reads performed
//! 1. Up to 64 bytes at offset 0 (the larger of the two header layouts).
//! 2. The section-header table in one read, at most
//!    [`MAX_SECTION_TABLE_BYTES`] bytes.
//! 3. Exactly [`SIG_RECORD_SIZE`] bytes at the signature section's offset.

pub mod header;
pub mod section;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;

pub use header::{
    Class, ElfHeader, Endian, Header32, Header64, ELF_MAGIC, MAX_SECTION_TABLE_BYTES,
};
pub use section::{SectionHeader, SignatureSection};

use common::{ReadAt, SIG_RECORD_SIZE};

/// Errors from ELF inspection.
#[derive(Debug, thiserror::Error)]
pub enum ElfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("short read of {what} at offset {offset}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        what: &'static str,
        offset: u64,
        wanted: usize,
        got: usize,
    },
    #[error("ELF header truncated: need {needed} bytes, found {found}")]
    TruncatedHeader { needed: usize, found: usize },
    #[error("unknown ELF class {0}")]
    BadClass(u8),
    #[error("unknown ELF data encoding {0}")]
    BadEncoding(u8),
    #[error("no section header table")]
    NoSectionTable,
    #[error("section header entry size is {found}, expected {expected}")]
    EntrySize { found: usize, expected: usize },
    #[error("too many section headers: {0}")]
    TooManySections(usize),
    #[error("signature section offset overflows")]
    OffsetOverflow,
}

impl ElfError {
    /// `true` for read failures, `false` for structural problems.
    pub fn is_io(&self) -> bool {
        matches!(self, ElfError::Io(_) | ElfError::ShortRead { .. })
    }
}

/// Result of scanning one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    NotElf,
    Unsigned(ElfHeader),
    Signed {
        header: ElfHeader,
        signature: SignatureSection,
    },
}

/// Reads and sanity-checks the ELF header. `Ok(None)` means "not ELF".
pub fn read_header<R: ReadAt + ?Sized>(file: &R) -> Result<Option<ElfHeader>, ElfError> {
    let mut prefix = [0u8; Class::Elf64.header_size()];
    let n = file.read_full_at(0, &mut prefix)?;
    header::parse(&prefix[..n])
}

/// Reads the whole section-header table in a single bounded read.
pub fn read_section_table<R: ReadAt + ?Sized>(
    file: &R,
    header: &ElfHeader,
) -> Result<Vec<SectionHeader>, ElfError> {
    let len = header.section_table_len();
    let offset = header.section_table_offset();
    let mut table = vec![0u8; len];
    let got = file.read_full_at(offset, &mut table)?;
    if got != len {
        return Err(ElfError::ShortRead {
            what: "section header table",
            offset,
            wanted: len,
            got,
        });
    }
    Ok(section::parse_table(header, &table))
}

/// Reads the signature record named by `sections`, if there is a valid one.
pub fn read_signature<R: ReadAt + ?Sized>(
    file: &R,
    sections: &[SectionHeader],
) -> Result<Option<SignatureSection>, ElfError> {
    let Some(found) = section::find_signature_section(sections) else {
        return Ok(None);
    };
    let offset = found.sh_offset;
    offset
        .checked_add(SIG_RECORD_SIZE as u64)
        .ok_or(ElfError::OffsetOverflow)?;

    let mut record = [0u8; SIG_RECORD_SIZE];
    let got = file.read_full_at(offset, &mut record)?;
    if got != SIG_RECORD_SIZE {
        return Err(ElfError::ShortRead {
            what: "signature record",
            offset,
            wanted: SIG_RECORD_SIZE,
            got,
        });
    }
    Ok(Some(SignatureSection { offset, record }))
}

/// Runs the three reads in order and classifies the file.
pub fn scan<R: ReadAt + ?Sized>(file: &R) -> Result<Scan, ElfError> {
    let Some(header) = read_header(file)? else {
        return Ok(Scan::NotElf);
    };
    let sections = read_section_table(file, &header)?;
    match read_signature(file, &sections)? {
        Some(signature) => Ok(Scan::Signed { header, signature }),
        None => Ok(Scan::Unsigned(header)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::ElfBuilder;

    #[test]
    fn test_scan_signed_64() {
        let image = ElfBuilder::new(Class::Elf64).signature_at(1000).build();
        match scan(&image).unwrap() {
            Scan::Signed { header, signature } => {
                assert_eq!(header.class(), Class::Elf64);
                assert_eq!(signature.offset, 1000);
                assert_eq!(signature.region(), 1000..1512);
            }
            other => panic!("expected signed, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_signed_32_big_endian() {
        let image = ElfBuilder::new(Class::Elf32)
            .big_endian()
            .signature_at(300)
            .build();
        match scan(&image).unwrap() {
            Scan::Signed { header, signature } => {
                assert_eq!(header.class(), Class::Elf32);
                assert_eq!(header.endian(), Endian::Big);
                assert_eq!(signature.offset, 300);
            }
            other => panic!("expected signed, got {other:?}"),
        }
    }

    #[test]
    fn test_record_bytes_are_returned() {
        let mut image = ElfBuilder::new(Class::Elf64).signature_at(2048).build();
        image[2048..2053].copy_from_slice(b"bsign");
        let Scan::Signed { signature, .. } = scan(&image).unwrap() else {
            panic!("expected signed");
        };
        assert_eq!(&signature.record[..5], b"bsign");
    }

    #[test]
    fn test_wrong_declared_size_is_unsigned_for_both_classes() {
        for class in [Class::Elf32, Class::Elf64] {
            let image = ElfBuilder::new(class)
                .signature_at(700)
                .declared_signature_size(256)
                .build();
            assert!(matches!(scan(&image).unwrap(), Scan::Unsigned(_)));
        }
    }

    #[test]
    fn test_signature_in_large_body() {
        let image = ElfBuilder::new(Class::Elf64)
            .body_len(20_000)
            .signature_at(9000)
            .build();
        assert!(image.len() > 20_000);
        let Scan::Signed { header, signature } = scan(&image).unwrap() else {
            panic!("expected signed");
        };
        assert!(header.section_table_offset() > 20_000);
        assert_eq!(signature.region(), 9000..9512);
    }

    #[test]
    fn test_no_signature_section() {
        let image = ElfBuilder::new(Class::Elf64).build();
        assert!(matches!(scan(&image).unwrap(), Scan::Unsigned(_)));
    }

    #[test]
    fn test_not_elf() {
        let script = b"#!/bin/sh\nexit 0\n".to_vec();
        assert_eq!(scan(&script).unwrap(), Scan::NotElf);
    }

    #[test]
    fn test_truncated_section_table_is_io() {
        let image = ElfBuilder::new(Class::Elf64).signature_at(1000).build();
        let truncated = image[..image.len() - 10].to_vec();
        let err = scan(&truncated).unwrap_err();
        assert!(err.is_io(), "{err}");
    }

    #[test]
    fn test_signature_past_eof_is_io() {
        // Table lives before the record; cut the file inside the record.
        let image = ElfBuilder::new(Class::Elf64)
            .signature_at(4000)
            .table_first()
            .build();
        let truncated = image[..4100].to_vec();
        let err = scan(&truncated).unwrap_err();
        assert!(matches!(
            err,
            ElfError::ShortRead {
                what: "signature record",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_is_not_io() {
        let mut image = ElfBuilder::new(Class::Elf64).build();
        image[4] = 9;
        let err = scan(&image).unwrap_err();
        assert!(!err.is_io());
    }
}
