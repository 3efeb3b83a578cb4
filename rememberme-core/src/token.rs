use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// URL-safe alphabet used by [`TokenFormat::Plain`]. 64 symbols, so mapping a
/// byte with `b % 64` keeps the distribution uniform.
const PLAIN_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token length must be at least one byte")]
    ZeroLength,
    #[error("unsupported token format `{0}` (expected hex, plain or base64)")]
    UnsupportedFormat(String),
    #[error("secure random source failed: {0}")]
    Entropy(String),
}

/// Output encoding for generated tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFormat {
    /// Lowercase hexadecimal, doubles the length.
    #[default]
    Hex,
    /// One printable character per random byte.
    Plain,
    /// URL-safe base64 without padding.
    #[serde(alias = "base64url")]
    Base64,
}

impl TokenFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hex => "hex",
            Self::Plain => "plain",
            Self::Base64 => "base64",
        }
    }

    fn encode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Hex => hex::encode(bytes),
            Self::Base64 => URL_SAFE_NO_PAD.encode(bytes),
            Self::Plain => bytes
                .iter()
                .map(|b| PLAIN_ALPHABET[(*b as usize) % PLAIN_ALPHABET.len()] as char)
                .collect(),
        }
    }
}

impl fmt::Display for TokenFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenFormat {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hex" => Ok(Self::Hex),
            "plain" => Ok(Self::Plain),
            "base64" | "base64url" => Ok(Self::Base64),
            other => Err(TokenError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Source of fresh one-time and persistent tokens.
///
/// Implementations must draw from a cryptographically secure source and must
/// never emit the triplet separator.
pub trait TokenGenerator: Send + Sync {
    fn create_token(&self) -> Result<String, TokenError>;
}

/// Token generator backed by the operating system RNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomTokenGenerator {
    token_bytes: usize,
    format: TokenFormat,
}

impl RandomTokenGenerator {
    pub const DEFAULT_TOKEN_BYTES: usize = 16;

    pub fn new(
        token_bytes: usize,
        format: TokenFormat,
    ) -> Result<Self, TokenError> {
        if token_bytes == 0 {
            return Err(TokenError::ZeroLength);
        }
        Ok(Self {
            token_bytes,
            format,
        })
    }

    pub fn token_bytes(&self) -> usize {
        self.token_bytes
    }

    pub fn format(&self) -> TokenFormat {
        self.format
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self {
            token_bytes: Self::DEFAULT_TOKEN_BYTES,
            format: TokenFormat::Hex,
        }
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn create_token(&self) -> Result<String, TokenError> {
        let mut bytes = Zeroizing::new(vec![0u8; self.token_bytes]);
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| TokenError::Entropy(err.to_string()))?;
        Ok(self.format.encode(&bytes))
    }
}
