//! Synthetic ELF images for tests.
//!
//! Produces the smallest file the scanner accepts: a header, a patterned body,
//! an optional zero-filled signature section and a section-header table.

use crate::header::{Class, Endian, ELF_MAGIC};
use common::{SHT_DIGSIG, SIG_RECORD_SIZE};

const SHT_PROGBITS: u32 = 1;

/// Builder for signed/unsigned test binaries.
#[derive(Debug, Clone)]
pub struct ElfBuilder {
    class: Class,
    endian: Endian,
    body_len: usize,
    signature: Option<usize>,
    declared_size: u64,
    table_first: bool,
}

impl ElfBuilder {
    pub fn new(class: Class) -> Self {
        Self {
            class,
            endian: Endian::Little,
            body_len: 3000,
            signature: None,
            declared_size: SIG_RECORD_SIZE as u64,
            table_first: false,
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.endian = Endian::Big;
        self
    }

    /// Bytes of patterned content after the header (and table, if first).
    pub fn body_len(mut self, len: usize) -> Self {
        self.body_len = len;
        self
    }

    /// Places a signature section at `offset`. The body grows to contain it.
    pub fn signature_at(mut self, offset: usize) -> Self {
        self.signature = Some(offset);
        self
    }

    /// Overrides the `sh_size` written for the signature section.
    pub fn declared_signature_size(mut self, size: u64) -> Self {
        self.declared_size = size;
        self
    }

    /// Puts the section table directly after the header instead of at the end.
    pub fn table_first(mut self) -> Self {
        self.table_first = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let header_size = self.class.header_size();
        let entry_size = self.class.section_entry_size();
        let count = if self.signature.is_some() { 3 } else { 2 };
        let table_len = count * entry_size;

        let body_start = if self.table_first {
            align8(header_size) + table_len
        } else {
            header_size
        };
        let mut body_end = body_start + self.body_len;
        if let Some(offset) = self.signature {
            assert!(
                offset >= body_start,
                "signature at {offset} overlaps header/table ending at {body_start}"
            );
            body_end = body_end.max(offset + SIG_RECORD_SIZE);
        }
        let (table_off, total) = if self.table_first {
            (align8(header_size), body_end)
        } else {
            let at = align8(body_end);
            (at, at + table_len)
        };

        let mut image = vec![0u8; total];
        for (i, b) in image[body_start..body_end].iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(31).wrapping_add(7);
        }
        if let Some(offset) = self.signature {
            image[offset..offset + SIG_RECORD_SIZE].fill(0);
        }

        let mut w = Writer {
            buf: &mut image,
            endian: self.endian,
        };
        w.buf[..4].copy_from_slice(&ELF_MAGIC);
        w.buf[4] = match self.class {
            Class::Elf32 => 1,
            Class::Elf64 => 2,
        };
        w.buf[5] = match self.endian {
            Endian::Little => 1,
            Endian::Big => 2,
        };
        w.buf[6] = 1;
        match self.class {
            Class::Elf32 => {
                w.u16(16, 2);
                w.u16(18, 3);
                w.u32(20, 1);
                w.u32(32, table_off as u32);
                w.u16(40, header_size as u16);
                w.u16(46, entry_size as u16);
                w.u16(48, count as u16);
            }
            Class::Elf64 => {
                w.u16(16, 2);
                w.u16(18, 62);
                w.u32(20, 1);
                w.u64(40, table_off as u64);
                w.u16(52, header_size as u16);
                w.u16(58, entry_size as u16);
                w.u16(60, count as u16);
            }
        }

        let mut entries = vec![
            (0u32, 0u64, 0u64),
            (
                SHT_PROGBITS,
                body_start as u64,
                (body_end - body_start) as u64,
            ),
        ];
        if let Some(offset) = self.signature {
            entries.push((SHT_DIGSIG, offset as u64, self.declared_size));
        }
        for (i, (sh_type, offset, size)) in entries.into_iter().enumerate() {
            let base = table_off + i * entry_size;
            w.u32(base + 4, sh_type);
            match self.class {
                Class::Elf32 => {
                    w.u32(base + 16, offset as u32);
                    w.u32(base + 20, size as u32);
                }
                Class::Elf64 => {
                    w.u64(base + 24, offset);
                    w.u64(base + 32, size);
                }
            }
        }

        image
    }
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

struct Writer<'a> {
    buf: &'a mut [u8],
    endian: Endian,
}

impl Writer<'_> {
    fn put(&mut self, at: usize, le: &[u8], be: &[u8]) {
        let bytes = match self.endian {
            Endian::Little => le,
            Endian::Big => be,
        };
        self.buf[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn u16(&mut self, at: usize, v: u16) {
        self.put(at, &v.to_le_bytes(), &v.to_be_bytes());
    }

    fn u32(&mut self, at: usize, v: u32) {
        self.put(at, &v.to_le_bytes(), &v.to_be_bytes());
    }

    fn u64(&mut self, at: usize, v: u64) {
        self.put(at, &v.to_le_bytes(), &v.to_be_bytes());
    }
}
