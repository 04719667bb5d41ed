//! Deterministic test signers.
//!
//! Signs digests the way an offline signing tool would, so downstream suites
//! can produce signed fixtures without shelling out.

use crate::key::PublicKey;
use crate::record::SignatureRecord;
use common::{HashAlgorithm, SignatureScheme};
use ed25519_dalek::{Signer as _, SigningKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use std::sync::OnceLock;

/// Ed25519 seed shared by every test suite.
pub const TEST_SIGNING_KEY_SEED: [u8; 32] = [
    0x9d, 0x50, 0x02, 0x57, 0x38, 0x37, 0x5e, 0x05, 0xd5, 0x18, 0x4a, 0x96, 0xc0, 0x9f, 0x56, 0xb6,
    0x11, 0xac, 0x59, 0x79, 0x6d, 0xf9, 0x53, 0x87, 0x4a, 0xe6, 0x02, 0x58, 0xe8, 0x3a, 0x97, 0x36,
];

static RSA_KEY: OnceLock<RsaPrivateKey> = OnceLock::new();

/// A 1024-bit RSA key generated once per test binary.
pub fn rsa_private_key() -> &'static RsaPrivateKey {
    RSA_KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("RSA key generation")
    })
}

/// Signing half of a test key pair.
#[derive(Clone)]
pub enum TestSigner {
    Rsa(RsaPrivateKey),
    Ed25519(SigningKey),
}

impl TestSigner {
    pub fn rsa() -> Self {
        TestSigner::Rsa(rsa_private_key().clone())
    }

    pub fn ed25519() -> Self {
        TestSigner::Ed25519(SigningKey::from_bytes(&TEST_SIGNING_KEY_SEED))
    }

    /// A key pair that is not the default one for its scheme.
    pub fn other(scheme: SignatureScheme) -> Self {
        match scheme {
            SignatureScheme::Rsa => TestSigner::Rsa(
                RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("RSA key generation"),
            ),
            SignatureScheme::Ed25519 => TestSigner::Ed25519(SigningKey::from_bytes(&[0x42; 32])),
        }
    }

    pub fn scheme(&self) -> SignatureScheme {
        match self {
            TestSigner::Rsa(_) => SignatureScheme::Rsa,
            TestSigner::Ed25519(_) => SignatureScheme::Ed25519,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            TestSigner::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
            TestSigner::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }

    /// Signs a finished digest and wraps it in a record.
    pub fn sign(&self, hash: HashAlgorithm, digest: &[u8]) -> SignatureRecord {
        let signature = match self {
            TestSigner::Rsa(key) => {
                let padding = match hash {
                    HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
                    HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
                };
                key.sign(padding, digest).expect("RSA signing")
            }
            TestSigner::Ed25519(key) => key.sign(digest).to_bytes().to_vec(),
        };
        SignatureRecord::new(hash, self.scheme(), signature).expect("signature fits record")
    }
}
