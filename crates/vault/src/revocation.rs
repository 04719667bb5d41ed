//! Revocation list of signature identifiers.
//!
//! A signature is identified by the BLAKE3 hash of its raw bytes. The text
//! form is one lowercase hex id per line; blank lines and `#` comments are
//! ignored.

use crate::record::SignatureRecord;
use crate::VaultError;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignatureId([u8; 32]);

impl SignatureId {
    pub fn of(signature: &[u8]) -> Self {
        Self(*blake3::hash(signature).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for SignatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SignatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureId({self})")
    }
}

impl FromStr for SignatureId {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())?;
        let raw: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::RevocationEntry(s.trim().to_string()))?;
        Ok(Self(raw))
    }
}

/// Set of revoked signatures. Empty by default.
#[derive(Debug, Clone, Default)]
pub struct RevocationSet {
    ids: HashSet<SignatureId>,
}

impl RevocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the line-oriented text form.
    pub fn parse(text: &str) -> Result<Self, VaultError> {
        let mut set = Self::new();
        for line in text.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            set.insert(line.parse()?);
        }
        Ok(set)
    }

    /// Returns `true` if the id was not already present.
    pub fn insert(&mut self, id: SignatureId) -> bool {
        self.ids.insert(id)
    }

    /// Returns `true` if the id was present.
    pub fn remove(&mut self, id: &SignatureId) -> bool {
        self.ids.remove(id)
    }

    pub fn is_revoked(&self, record: &SignatureRecord) -> bool {
        self.ids.contains(&record.id())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
