//! Subsystem configuration.
//!
//! Consumed, never owned: the host (or the `digsig` binary) builds a
//! [`DigsigConfig`] once at start-up and hands it to the gate. JSON files may
//! omit any field; missing fields fall back to [`DigsigConfig::default`].

use crate::{DenyReason, Status, PERMIT};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
    #[error("cache_buckets must be at least 1")]
    ZeroCacheBuckets,
    #[error("block_size must be at least 1")]
    ZeroBlockSize,
}

/// Enforcement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Denials are returned to the host.
    #[default]
    Restrictive,
    /// Checks still run, denials are logged and the operation is permitted.
    Permissive,
}

impl Mode {
    /// Resolves a denial into the status handed back to the host.
    pub fn resolve(self, reason: &DenyReason) -> Status {
        match self {
            Mode::Restrictive => reason.status(),
            Mode::Permissive => PERMIT,
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restrictive" => Ok(Mode::Restrictive),
            "permissive" => Ok(Mode::Permissive),
            other => Err(invalid("mode", other)),
        }
    }
}

/// Digest algorithm the signer hashed the file with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Identifier stored in the signature record.
    pub fn id(self) -> u8 {
        match self {
            HashAlgorithm::Sha1 => 1,
            HashAlgorithm::Sha256 => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(HashAlgorithm::Sha1),
            2 => Some(HashAlgorithm::Sha256),
            _ => None,
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(invalid("hash", other)),
        }
    }
}

/// Public-key signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    /// RSA with PKCS#1 v1.5 padding over the digest.
    #[default]
    Rsa,
    /// Ed25519 over the raw digest bytes.
    Ed25519,
}

impl SignatureScheme {
    /// Identifier stored in the signature record.
    pub fn id(self) -> u8 {
        match self {
            SignatureScheme::Rsa => 1,
            SignatureScheme::Ed25519 => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(SignatureScheme::Rsa),
            2 => Some(SignatureScheme::Ed25519),
            _ => None,
        }
    }
}

impl FromStr for SignatureScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rsa" => Ok(SignatureScheme::Rsa),
            "ed25519" => Ok(SignatureScheme::Ed25519),
            other => Err(invalid("scheme", other)),
        }
    }
}

/// Runtime configuration of the signature gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigsigConfig {
    pub mode: Mode,
    /// Number of validation-cache buckets, fixed for the subsystem's lifetime.
    pub cache_buckets: usize,
    /// Filesystem type names whose content may change behind our back.
    pub fs_blacklist: Vec<String>,
    /// Also refuse files living on USB mass storage.
    pub restrict_usb: bool,
    /// Bytes read per step of the streaming digest.
    pub block_size: usize,
    /// Keep a successful mapper's write-hold until its descriptor closes.
    pub hold_until_close: bool,
    pub hash: HashAlgorithm,
    pub scheme: SignatureScheme,
}

impl Default for DigsigConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Restrictive,
            cache_buckets: 128,
            fs_blacklist: vec!["nfs".into(), "cifs".into()],
            restrict_usb: false,
            block_size: 4096,
            hold_until_close: false,
            hash: HashAlgorithm::Sha1,
            scheme: SignatureScheme::Rsa,
        }
    }
}

impl DigsigConfig {
    /// Parses a (possibly partial) JSON document and validates it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: DigsigConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the subsystem cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_buckets == 0 {
            return Err(ConfigError::ZeroCacheBuckets);
        }
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        Ok(())
    }

    /// Applies `DIGSIG_*` overrides obtained through `lookup`.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DIGSIG_MODE") {
            self.mode = v.parse()?;
        }
        if let Some(v) = lookup("DIGSIG_CACHE_BUCKETS") {
            self.cache_buckets = parse_number("DIGSIG_CACHE_BUCKETS", &v)?;
        }
        if let Some(v) = lookup("DIGSIG_BLOCK_SIZE") {
            self.block_size = parse_number("DIGSIG_BLOCK_SIZE", &v)?;
        }
        if let Some(v) = lookup("DIGSIG_FS_BLACKLIST") {
            self.fs_blacklist = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("DIGSIG_RESTRICT_USB") {
            self.restrict_usb = parse_bool("DIGSIG_RESTRICT_USB", &v)?;
        }
        if let Some(v) = lookup("DIGSIG_HOLD_UNTIL_CLOSE") {
            self.hold_until_close = parse_bool("DIGSIG_HOLD_UNTIL_CLOSE", &v)?;
        }
        if let Some(v) = lookup("DIGSIG_HASH") {
            self.hash = v.parse()?;
        }
        if let Some(v) = lookup("DIGSIG_SCHEME") {
            self.scheme = v.parse()?;
        }
        self.validate()
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}
