//! The verification path for one file.
//!
//! Runs with the global verification lock held: header, section table,
//! signature record, revocation check, digest, signature check.

use crate::host::ExecFile;
use common::DenyReason;
use elfscan::ElfError;
use forge::{Forge, ForgeError};
use parking_lot::RwLock;
use vault::{RevocationSet, SignatureRecord, Verdict, Verifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trust {
    /// Not an ELF file; nothing to verify.
    NotElf,
    Verified,
    /// Shut down while waiting for the verification lock.
    Stopped,
}

pub(crate) struct Pipeline<'a> {
    pub verifier: &'a Verifier,
    pub revocations: &'a RwLock<RevocationSet>,
    pub block_size: usize,
}

impl Pipeline<'_> {
    /// `busy`: the host has the file open for writing. Only ELF files are
    /// refused for it.
    pub(crate) fn run(&self, file: &dyn ExecFile, busy: bool) -> Result<Trust, DenyReason> {
        let Some(header) = elfscan::read_header(file).map_err(elf_denial)? else {
            return Ok(Trust::NotElf);
        };
        if busy {
            return Err(DenyReason::Busy);
        }
        log::debug!("{}: {:?} {:?}", file.name(), header.class(), header.endian());

        let sections = elfscan::read_section_table(file, &header).map_err(elf_denial)?;
        let Some(section) = elfscan::read_signature(file, &sections).map_err(elf_denial)? else {
            return Err(DenyReason::Unsigned);
        };
        let record = SignatureRecord::parse(&section.record)
            .map_err(|e| DenyReason::VerifyError(e.to_string()))?;

        if self.revocations.read().is_revoked(&record) {
            return Err(DenyReason::Revoked);
        }

        let forge = Forge::new(self.verifier.hash(), self.block_size).map_err(forge_denial)?;
        let digest = forge
            .digest_file(file, file.inode().size(), section.region())
            .map_err(forge_denial)?;

        match self.verifier.verify(&digest, &record) {
            Verdict::Match => Ok(Trust::Verified),
            Verdict::Mismatch => Err(DenyReason::Mismatch),
            Verdict::Error(e) => Err(DenyReason::VerifyError(e.to_string())),
        }
    }
}

fn elf_denial(err: ElfError) -> DenyReason {
    if err.is_io() {
        DenyReason::Io(err.to_string())
    } else {
        DenyReason::Malformed(err.to_string())
    }
}

fn forge_denial(err: ForgeError) -> DenyReason {
    match err {
        ForgeError::Io { .. } | ForgeError::ShortRead { .. } => DenyReason::Io(err.to_string()),
        ForgeError::ZeroBlockSize | ForgeError::Alloc(_) => DenyReason::Resource(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_classes() {
        let short = ElfError::ShortRead {
            what: "section header table",
            offset: 64,
            wanted: 128,
            got: 0,
        };
        assert!(matches!(elf_denial(short), DenyReason::Io(_)));
        assert!(matches!(
            elf_denial(ElfError::NoSectionTable),
            DenyReason::Malformed(_)
        ));
        assert!(matches!(
            forge_denial(ForgeError::Alloc(4096)),
            DenyReason::Resource(_)
        ));
        assert!(matches!(
            forge_denial(ForgeError::Io {
                offset: 0,
                source: io::Error::other("gone"),
            }),
            DenyReason::Io(_)
        ));
    }
}
