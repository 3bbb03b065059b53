//! 32-byte hash type and the canonical JSON encoding shared by every hashed
//! chain primitive (transactions, blocks, state).
//!
//! `serde_json`'s default writer already disables HTML escaping and never
//! appends a trailing newline, so [`to_canonical_json`] is a thin, audited
//! wrapper rather than a custom encoder: the contract lives in one place
//! instead of being re-derived at each call site.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const HASH_LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub [u8; HASH_LEN]);

#[derive(Debug, thiserror::Error)]
pub enum HashParseError {
    #[error("hash must be {HASH_LEN} bytes, got {0}")]
    WrongLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl Hash {
    pub fn zero() -> Self {
        Hash([0u8; HASH_LEN])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest);
        Hash(out)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH_LEN {
            return Err(HashParseError::WrongLength(bytes.len()));
        }
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&bytes);
        Ok(Hash(out))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Byte-exact canonical JSON of `value`: no HTML escaping, no trailing
/// newline, field order matches struct declaration order (serde_json
/// preserves declared field order unless the type opts into sorting).
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// SHA-256 of the canonical JSON encoding of `value`.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<Hash, serde_json::Error> {
    let bytes = to_canonical_json(value)?;
    Ok(Hash::from_bytes(&bytes))
}
