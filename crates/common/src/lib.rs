//! # Common: Shared Vocabulary of the Signature Gate
//!
//! Identifiers, protection/access flags, host status codes and the denial
//! taxonomy used by every stage of the verification pipeline.
//!
//! ## Status convention
//! Every host-facing hook returns a [`Status`]: `0` permits the operation, a
//! negative errno denies it. [`DenyReason::status`] performs the mapping.

pub mod config;
pub mod io;

pub use config::{ConfigError, DigsigConfig, HashAlgorithm, Mode, SignatureScheme};
pub use io::ReadAt;

use bitflags::bitflags;
use std::fmt;

/// Size in bytes of the signature record embedded in a signed ELF file.
pub const SIG_RECORD_SIZE: usize = 512;

/// `sh_type` of the section holding the signature record.
pub const SHT_DIGSIG: u32 = 0x8073_6967;

/// Opaque identity of an inode: (device, inode number).
///
/// Never dereferenced; holding one does not keep the inode alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InodeId {
    pub dev: u64,
    pub ino: u64,
}

impl InodeId {
    pub const fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }
}

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

bitflags! {
    /// Protection requested for a memory mapping (`PROT_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const EXEC = 0x4;
    }
}

bitflags! {
    /// Access mask handed to permission checks (`MAY_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMask: u32 {
        const EXEC = 0x1;
        const WRITE = 0x2;
        const READ = 0x4;
        const APPEND = 0x8;
    }
}

/// Positive errno values; hooks return them negated.
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EINVAL: i32 = 22;
    pub const ETXTBSY: i32 = 26;
}

/// Host-facing hook result: `0` permits, a negative errno denies.
pub type Status = i32;

/// The permit status.
pub const PERMIT: Status = 0;

/// Why the pipeline refused an operation.
///
/// Format, I/O and resource failures are infrastructure problems; revoked,
/// mismatching or missing signatures and untrusted media are security events;
/// `Busy` is contention and not a violation at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("malformed ELF: {0}")]
    Malformed(String),
    #[error("I/O failure: {0}")]
    Io(String),
    #[error("resource exhausted: {0}")]
    Resource(String),
    #[error("no signature section")]
    Unsigned,
    #[error("signature is revoked")]
    Revoked,
    #[error("signature does not match")]
    Mismatch,
    #[error("verification error: {0}")]
    VerifyError(String),
    #[error("untrusted media: {0}")]
    UntrustedMedia(String),
    #[error("text file busy")]
    Busy,
}

impl DenyReason {
    /// Positive errno for this reason.
    pub fn errno(&self) -> i32 {
        match self {
            DenyReason::Malformed(_) => errno::EINVAL,
            DenyReason::Io(_) => errno::EIO,
            DenyReason::Resource(_) => errno::ENOMEM,
            DenyReason::Busy => errno::ETXTBSY,
            DenyReason::Unsigned
            | DenyReason::Revoked
            | DenyReason::Mismatch
            | DenyReason::VerifyError(_)
            | DenyReason::UntrustedMedia(_) => errno::EPERM,
        }
    }

    /// Host status for this reason (always negative).
    pub fn status(&self) -> Status {
        -self.errno()
    }

    /// `true` for trust failures that belong in the security log.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            DenyReason::Unsigned
                | DenyReason::Revoked
                | DenyReason::Mismatch
                | DenyReason::UntrustedMedia(_)
        )
    }
}
