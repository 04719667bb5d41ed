//! On-disk signature record codec.
//!
//! ```text
//! [0..5)    "bsign"
//! [5]       format version (1)
//! [6]       hash id      (1 = SHA-1, 2 = SHA-256)
//! [7]       scheme id    (1 = RSA PKCS#1 v1.5, 2 = Ed25519)
//! [8..10)   signature length, big endian
//! [10..512) signature bytes, zero padded
//! ```

use crate::revocation::SignatureId;
use crate::VaultError;
use common::{HashAlgorithm, SignatureScheme, SIG_RECORD_SIZE};

pub const RECORD_MAGIC: &[u8; 5] = b"bsign";
pub const RECORD_VERSION: u8 = 1;

/// Length of the metadata prefix preceding the signature payload.
pub const METADATA_LEN: usize = 10;

/// Largest signature the record can carry.
pub const MAX_SIGNATURE_LEN: usize = SIG_RECORD_SIZE - METADATA_LEN;

/// A decoded signature record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    hash: HashAlgorithm,
    scheme: SignatureScheme,
    signature: Vec<u8>,
}

impl SignatureRecord {
    pub fn new(
        hash: HashAlgorithm,
        scheme: SignatureScheme,
        signature: Vec<u8>,
    ) -> Result<Self, VaultError> {
        if signature.len() > MAX_SIGNATURE_LEN {
            return Err(VaultError::SignatureTooLong(signature.len()));
        }
        Ok(Self {
            hash,
            scheme,
            signature,
        })
    }

    /// Decodes the raw bytes read from the signature section.
    pub fn parse(raw: &[u8; SIG_RECORD_SIZE]) -> Result<Self, VaultError> {
        if &raw[..RECORD_MAGIC.len()] != RECORD_MAGIC {
            return Err(VaultError::BadMagic);
        }
        if raw[5] != RECORD_VERSION {
            return Err(VaultError::UnsupportedVersion(raw[5]));
        }
        let hash = HashAlgorithm::from_id(raw[6]).ok_or(VaultError::UnknownHash(raw[6]))?;
        let scheme = SignatureScheme::from_id(raw[7]).ok_or(VaultError::UnknownScheme(raw[7]))?;
        let len = usize::from(u16::from_be_bytes([raw[8], raw[9]]));
        if len > MAX_SIGNATURE_LEN {
            return Err(VaultError::SignatureTooLong(len));
        }
        Ok(Self {
            hash,
            scheme,
            signature: raw[METADATA_LEN..METADATA_LEN + len].to_vec(),
        })
    }

    /// Encodes the record into its fixed on-disk form.
    pub fn to_bytes(&self) -> [u8; SIG_RECORD_SIZE] {
        let mut raw = [0u8; SIG_RECORD_SIZE];
        raw[..RECORD_MAGIC.len()].copy_from_slice(RECORD_MAGIC);
        raw[5] = RECORD_VERSION;
        raw[6] = self.hash.id();
        raw[7] = self.scheme.id();
        // new()/parse() cap the length at MAX_SIGNATURE_LEN, well below u16::MAX.
        raw[8..10].copy_from_slice(&(self.signature.len() as u16).to_be_bytes());
        raw[METADATA_LEN..METADATA_LEN + self.signature.len()].copy_from_slice(&self.signature);
        raw
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Identifier used by revocation lists.
    pub fn id(&self) -> SignatureId {
        SignatureId::of(&self.signature)
    }
}
