//! Persistence contract for hashed triplets and the bundled backends.
//!
//! Backends receive the *salted* plaintext tokens and are responsible for
//! hashing them with their configured [`HashAlgorithm`] before anything is
//! written or compared. Logically every backend stores
//!
//! ```text
//! (credential, hash(persistent ‖ salt)) -> (hash(one_time ‖ salt), expires_at)
//! ```
//!
//! and never the tokens themselves.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod hash;
pub mod memory;
pub mod verified;

#[cfg(feature = "file")]
pub mod file;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub mod redis;

pub use hash::{HashAlgorithm, UnsupportedHashAlgorithm, secure_compare};
pub use memory::{MemoryStorage, StoredRecord};
pub use verified::{CredentialVerifier, VerifiedStorage};

#[cfg(feature = "file")]
pub use file::FileStorage;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresStorage, PostgresStorageOptions};

#[cfg(feature = "redis")]
pub use self::redis::RedisStorage;

/// Tri-state result of [`TripletStorage::find_triplet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripletLookup {
    /// A live record exists and its one-time token matches.
    Found,
    /// No record exists for the credential/persistent token, or it expired.
    NotFound,
    /// A live record exists but the one-time token does not match.
    Invalid,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize stored record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("invalid storage configuration: {0}")]
    InvalidConfiguration(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Capability for persisting and looking up hashed triplets.
///
/// `token` and `persistent_token` are the salted plaintext values; hashing is
/// the backend's job. Implementations must make [`replace_triplet`] atomic
/// per `(credential, persistent_token)` key and must surface I/O failures
/// instead of retrying them.
///
/// [`replace_triplet`]: TripletStorage::replace_triplet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TripletStorage: Send + Sync {
    async fn find_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
    ) -> StorageResult<TripletLookup>;

    /// Create a record for a new device.
    async fn store_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Supersede the one-time token of an existing device and refresh its
    /// expiry.
    async fn replace_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Remove one device. Absent records are not an error.
    async fn clean_triplet(
        &self,
        credential: &str,
        persistent_token: &str,
    ) -> StorageResult<()>;

    /// Remove every device of a credential.
    async fn clean_all_triplets(&self, credential: &str) -> StorageResult<()>;

    /// Remove every record whose expiry precedes `before`.
    async fn clean_expired_tokens(
        &self,
        before: DateTime<Utc>,
    ) -> StorageResult<()>;
}
