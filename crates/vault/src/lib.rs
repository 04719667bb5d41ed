//! # The Vault: Signature Verification and Revocation
//!
//! Decides whether the digest of a file was signed by the one trusted key.
//!
//! ## Verdicts
//! [`Verifier::verify`] returns a tri-state [`Verdict`]:
//! - `Match` (code `0`): the signature is valid for the digest.
//! - `Mismatch` (code `> 0`): well-formed but wrong. Wrong key, tampered
//!   file, or a record made with a different algorithm.
//! - `Error` (code `< 0`): verification could not be carried out.
//!
//! The RSA path is PKCS#1 v1.5 over the SHA-1 or SHA-256 digest; the Ed25519
//! path signs the raw digest bytes.
//!
//! Revocation is checked separately ([`RevocationSet`]) so the caller can
//! reject a revoked record before spending time on the digest.

pub mod key;
pub mod record;
pub mod revocation;

#[cfg(any(test, feature = "fixtures"))]
pub mod testkit;

pub use key::PublicKey;
pub use record::{SignatureRecord, MAX_SIGNATURE_LEN};
pub use revocation::{RevocationSet, SignatureId};

use common::{HashAlgorithm, SignatureScheme};
use forge::FileDigest;
use rsa::Pkcs1v15Sign;

/// Errors from key loading, record decoding and verification.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("signature record magic missing")]
    BadMagic,
    #[error("unsupported signature record version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown hash algorithm id {0}")]
    UnknownHash(u8),
    #[error("unknown signature scheme id {0}")]
    UnknownScheme(u8),
    #[error("signature of {0} bytes does not fit the record")]
    SignatureTooLong(usize),
    #[error("cannot parse public key: {0}")]
    KeyParse(String),
    #[error("Ed25519 public key must be 32 bytes, got {0}")]
    KeyLength(usize),
    #[error("key is {key:?} but {configured:?} is configured")]
    KeyScheme {
        key: SignatureScheme,
        configured: SignatureScheme,
    },
    #[error("digest is {found:?} but {expected:?} is configured")]
    DigestAlgorithm {
        found: HashAlgorithm,
        expected: HashAlgorithm,
    },
    #[error("invalid revocation entry {0:?}")]
    RevocationEntry(String),
    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Outcome of a single verification.
#[derive(Debug)]
pub enum Verdict {
    Match,
    Mismatch,
    Error(VaultError),
}

impl Verdict {
    /// `0` for a match, `1` for a mismatch, `-1` for an error.
    pub fn code(&self) -> i32 {
        match self {
            Verdict::Match => 0,
            Verdict::Mismatch => 1,
            Verdict::Error(_) => -1,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match)
    }
}

/// Verifies digests against the trusted key with the configured algorithms.
#[derive(Debug, Clone)]
pub struct Verifier {
    key: PublicKey,
    hash: HashAlgorithm,
    scheme: SignatureScheme,
}

impl Verifier {
    pub fn new(
        key: PublicKey,
        hash: HashAlgorithm,
        scheme: SignatureScheme,
    ) -> Result<Self, VaultError> {
        if key.scheme() != scheme {
            return Err(VaultError::KeyScheme {
                key: key.scheme(),
                configured: scheme,
            });
        }
        Ok(Self { key, hash, scheme })
    }

    pub fn key(&self) -> &PublicKey {
        &self.key
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Checks `record` against `digest`.
    pub fn verify(&self, digest: &FileDigest, record: &SignatureRecord) -> Verdict {
        if digest.algorithm() != self.hash {
            return Verdict::Error(VaultError::DigestAlgorithm {
                found: digest.algorithm(),
                expected: self.hash,
            });
        }
        if record.hash() != self.hash || record.scheme() != self.scheme {
            log::debug!(
                "record uses {:?}/{:?}, configured {:?}/{:?}",
                record.hash(),
                record.scheme(),
                self.hash,
                self.scheme
            );
            return Verdict::Mismatch;
        }

        match &self.key {
            PublicKey::Rsa(key) => {
                let padding = match self.hash {
                    HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
                    HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
                };
                match key.verify(padding, digest.as_bytes(), record.signature()) {
                    Ok(()) => Verdict::Match,
                    Err(rsa::Error::Verification) => Verdict::Mismatch,
                    Err(e) => Verdict::Error(e.into()),
                }
            }
            PublicKey::Ed25519(key) => {
                let Ok(raw) = <[u8; 64]>::try_from(record.signature()) else {
                    return Verdict::Mismatch;
                };
                let signature = ed25519_dalek::Signature::from_bytes(&raw);
                match key.verify_strict(digest.as_bytes(), &signature) {
                    Ok(()) => Verdict::Match,
                    Err(_) => Verdict::Mismatch,
                }
            }
        }
    }
}
