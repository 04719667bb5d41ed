//! Trusted public key loading.

use crate::VaultError;
use base64::Engine;
use common::SignatureScheme;
use ed25519_dalek::VerifyingKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use std::fmt;

/// The single key every signature is checked against.
#[derive(Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Ed25519(VerifyingKey),
}

impl PublicKey {
    /// Parses an RSA key from PEM: PKCS#1 (`RSA PUBLIC KEY`) or SPKI
    /// (`PUBLIC KEY`).
    pub fn rsa_from_pem(pem: &str) -> Result<Self, VaultError> {
        let key = if pem.contains("BEGIN RSA PUBLIC KEY") {
            RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| VaultError::KeyParse(e.to_string()))?
        } else {
            RsaPublicKey::from_public_key_pem(pem)
                .map_err(|e| VaultError::KeyParse(e.to_string()))?
        };
        Ok(PublicKey::Rsa(key))
    }

    /// Parses an RSA key from DER, trying SPKI first and PKCS#1 second.
    pub fn rsa_from_der(der: &[u8]) -> Result<Self, VaultError> {
        RsaPublicKey::from_public_key_der(der)
            .or_else(|_| RsaPublicKey::from_pkcs1_der(der))
            .map(PublicKey::Rsa)
            .map_err(|e| VaultError::KeyParse(e.to_string()))
    }

    pub fn ed25519_from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| VaultError::KeyLength(bytes.len()))?;
        VerifyingKey::from_bytes(&raw)
            .map(PublicKey::Ed25519)
            .map_err(|e| VaultError::KeyParse(e.to_string()))
    }

    /// Ed25519 key as base64 or hex text.
    pub fn ed25519_from_text(text: &str) -> Result<Self, VaultError> {
        let text = text.trim();
        let bytes = match hex::decode(text) {
            Ok(bytes) => bytes,
            Err(_) => base64::engine::general_purpose::STANDARD.decode(text)?,
        };
        Self::ed25519_from_bytes(&bytes)
    }

    /// Loads key material of the given scheme from file contents.
    pub fn load(scheme: SignatureScheme, contents: &[u8]) -> Result<Self, VaultError> {
        match scheme {
            SignatureScheme::Rsa => match std::str::from_utf8(contents) {
                Ok(text) if text.contains("-----BEGIN") => Self::rsa_from_pem(text),
                _ => Self::rsa_from_der(contents),
            },
            SignatureScheme::Ed25519 => {
                if contents.len() == 32 {
                    return Self::ed25519_from_bytes(contents);
                }
                let text = std::str::from_utf8(contents)
                    .map_err(|e| VaultError::KeyParse(e.to_string()))?;
                Self::ed25519_from_text(text)
            }
        }
    }

    pub fn scheme(&self) -> SignatureScheme {
        match self {
            PublicKey::Rsa(_) => SignatureScheme::Rsa,
            PublicKey::Ed25519(_) => SignatureScheme::Ed25519,
        }
    }

    /// Key size in bits.
    pub fn bits(&self) -> usize {
        match self {
            PublicKey::Rsa(key) => key.size() * 8,
            PublicKey::Ed25519(_) => 256,
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicKey::Rsa(_) => write!(f, "PublicKey::Rsa({} bits)", self.bits()),
            PublicKey::Ed25519(key) => {
                write!(f, "PublicKey::Ed25519({})", hex::encode(key.as_bytes()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};

    #[test]
    fn test_rsa_pem_forms() {
        let private = crate::testkit::rsa_private_key();
        let public = private.to_public_key();

        let pkcs1 = public.to_pkcs1_pem(LineEnding::LF).unwrap();
        let spki = public.to_public_key_pem(LineEnding::LF).unwrap();
        for pem in [pkcs1, spki] {
            let key = PublicKey::load(SignatureScheme::Rsa, pem.as_bytes()).unwrap();
            assert_eq!(key, PublicKey::Rsa(public.clone()));
            assert_eq!(key.scheme(), SignatureScheme::Rsa);
        }
    }

    #[test]
    fn test_rsa_der() {
        let public = crate::testkit::rsa_private_key().to_public_key();
        let der = public.to_public_key_der().unwrap();
        let key = PublicKey::load(SignatureScheme::Rsa, der.as_bytes()).unwrap();
        assert_eq!(key, PublicKey::Rsa(public));
    }

    #[test]
    fn test_ed25519_encodings() {
        let verifying = SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        let raw = verifying.to_bytes();
        let b64 = base64::engine::general_purpose::STANDARD.encode(raw);
        let hexed = hex::encode(raw);

        for contents in [raw.to_vec(), b64.into_bytes(), hexed.into_bytes()] {
            let key = PublicKey::load(SignatureScheme::Ed25519, &contents).unwrap();
            assert_eq!(key, PublicKey::Ed25519(verifying));
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(PublicKey::load(SignatureScheme::Rsa, b"not a key").is_err());
        assert!(matches!(
            PublicKey::ed25519_from_bytes(&[1, 2, 3]),
            Err(VaultError::KeyLength(3))
        ));
        assert!(PublicKey::ed25519_from_text("!!!").is_err());
    }
}
