use std::fmt;
use std::str::FromStr;

use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_512};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "hash algorithm `{0}` is not supported (expected one of sha256, sha384, sha512, sha3-256, sha3-512)"
)]
pub struct UnsupportedHashAlgorithm(pub String);

/// Digest applied to salted tokens before they reach a backend.
///
/// Only modern digests are accepted; legacy ones such as SHA-1 or MD5 fail
/// to parse.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_512,
}

impl HashAlgorithm {
    pub const ALLOWED: [HashAlgorithm; 5] = [
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Sha3_256,
        Self::Sha3_512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Sha3_256 => "sha3-256",
            Self::Sha3_512 => "sha3-512",
        }
    }

    /// Lowercase hex digest of `value`.
    pub fn hash(&self, value: &str) -> String {
        let bytes = value.as_bytes();
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(bytes)),
            Self::Sha384 => hex::encode(Sha384::digest(bytes)),
            Self::Sha512 => hex::encode(Sha512::digest(bytes)),
            Self::Sha3_256 => hex::encode(Sha3_256::digest(bytes)),
            Self::Sha3_512 => hex::encode(Sha3_512::digest(bytes)),
        }
    }

    /// Hash `candidate` and compare it against a stored digest in constant
    /// time.
    pub fn verify(&self, candidate: &str, stored_hash: &str) -> bool {
        secure_compare(&self.hash(candidate), stored_hash.trim())
    }
}

/// Constant-time equality for secret digests.
pub fn secure_compare(left: &str, right: &str) -> bool {
    let left = left.as_bytes();
    let right = right.as_bytes();

    if left.len() != right.len() {
        return false;
    }

    constant_time_eq(left, right)
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = UnsupportedHashAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALLOWED
            .into_iter()
            .find(|algo| algo.as_str() == normalized)
            .ok_or(UnsupportedHashAlgorithm(normalized))
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = UnsupportedHashAlgorithm;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashAlgorithm> for String {
    fn from(value: HashAlgorithm) -> Self {
        value.as_str().to_string()
    }
}
