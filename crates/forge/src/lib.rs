//! # The Forge: Streaming File Digest
//!
//! Hashes a file in fixed-size blocks with one byte range (the embedded
//! signature record) **replaced by zeros**, reproducing exactly what the
//! signer hashed before inserting the record.
//!
//! ## Masking Rule
//! For each block `[start, start + len)` the intersection with the excluded
//! range is zeroed in the block buffer before the hash update. The range may
//! straddle any number of block boundaries; the result does not depend on
//! the block size.
//!
//! The file is never materialised in memory: one block buffer is allocated
//! per digest and dropped on every exit path.

use common::{HashAlgorithm, ReadAt};
use sha1::Digest as _;
use std::fmt;
use std::ops::Range;

/// Errors from digest computation.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("I/O error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("short read at offset {offset}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        offset: u64,
        wanted: usize,
        got: usize,
    },
    #[error("block size must be non-zero")]
    ZeroBlockSize,
    #[error("cannot allocate a {0}-byte block buffer")]
    Alloc(usize),
}

/// A finished file digest.
#[derive(Clone, PartialEq, Eq)]
pub struct FileDigest {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl FileDigest {
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(", self.algorithm)?;
        for byte in &self.bytes {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// Incremental hasher over the supported algorithms.
#[derive(Clone)]
pub enum Hasher {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> FileDigest {
        match self {
            Hasher::Sha1(h) => FileDigest {
                algorithm: HashAlgorithm::Sha1,
                bytes: h.finalize().to_vec(),
            },
            Hasher::Sha256(h) => FileDigest {
                algorithm: HashAlgorithm::Sha256,
                bytes: h.finalize().to_vec(),
            },
        }
    }
}

/// Block-streaming digest engine.
#[derive(Debug, Clone, Copy)]
pub struct Forge {
    algorithm: HashAlgorithm,
    block_size: usize,
}

impl Forge {
    pub fn new(algorithm: HashAlgorithm, block_size: usize) -> Result<Self, ForgeError> {
        if block_size == 0 {
            return Err(ForgeError::ZeroBlockSize);
        }
        Ok(Self {
            algorithm,
            block_size,
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Digests `file[0..size)` with `excluded` zeroed.
    ///
    /// # Errors
    /// Any read failure or short read aborts the digest; the partial hash
    /// state is discarded.
    pub fn digest_file<R: ReadAt + ?Sized>(
        &self,
        file: &R,
        size: u64,
        excluded: Range<u64>,
    ) -> Result<FileDigest, ForgeError> {
        let mut buf = Vec::<u8>::new();
        buf.try_reserve_exact(self.block_size)
            .map_err(|_| ForgeError::Alloc(self.block_size))?;
        buf.resize(self.block_size, 0);

        let mut hasher = Hasher::new(self.algorithm);
        let mut offset = 0u64;
        while offset < size {
            // Bounded by block_size, so the cast cannot truncate.
            let wanted = (size - offset).min(self.block_size as u64) as usize;
            let block = &mut buf[..wanted];
            let got = file
                .read_full_at(offset, block)
                .map_err(|source| ForgeError::Io { offset, source })?;
            if got != wanted {
                return Err(ForgeError::ShortRead {
                    offset,
                    wanted,
                    got,
                });
            }
            mask_block(block, offset, &excluded);
            hasher.update(block);
            offset += wanted as u64;
        }

        log::trace!("digested {size} bytes excluding {excluded:?}");
        Ok(hasher.finalize())
    }
}

/// Zeroes the part of `block` (starting at file offset `start`) that falls
/// inside `excluded`.
fn mask_block(block: &mut [u8], start: u64, excluded: &Range<u64>) {
    let end = start + block.len() as u64;
    let lo = excluded.start.max(start);
    let hi = excluded.end.min(end);
    if lo < hi {
        block[(lo - start) as usize..(hi - start) as usize].fill(0);
    }
}
