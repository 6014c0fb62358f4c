//! CacheKey: the SHA-1 digest of the concatenated key inputs, as 40 lowercase hex chars.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a key in hex characters.
pub const KEY_HEX_LEN: usize = 40;

/// An opaque, content-addressed cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

/// Errors that can occur when parsing a cache key.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid key length: expected 40 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in key")]
    InvalidHex,
}

impl CacheKey {
    /// Derive a key from the prefix, info hash, and origin path, in that order.
    pub fn derive(prefix: &str, info_hash: &str, origin_path: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(prefix.as_bytes());
        hasher.update(info_hash.as_bytes());
        hasher.update(origin_path.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Create from an existing key string (validates format).
    pub fn from_str_checked(s: &str) -> Result<Self, HashError> {
        if s.len() != KEY_HEX_LEN {
            return Err(HashError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::InvalidHex);
        }
        Ok(Self(s.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CacheKey {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The named inputs a key is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInputs {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub info_hash: String,
    #[serde(default)]
    pub origin_path: String,
}

impl KeyInputs {
    pub fn new(
        prefix: impl Into<String>,
        info_hash: impl Into<String>,
        origin_path: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            info_hash: info_hash.into(),
            origin_path: origin_path.into(),
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::derive(&self.prefix, &self.info_hash, &self.origin_path)
    }
}
