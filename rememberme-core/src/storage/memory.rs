use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;

use super::{HashAlgorithm, StorageResult, TripletLookup, TripletStorage};

/// Hashed record as kept by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub credential: String,
    pub persistent_token_hash: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Process-local storage, mainly for tests and single-instance deployments.
///
/// Replacement is a single map insert, which dashmap serializes per shard,
/// so concurrent rotations of the same key cannot interleave.
#[derive(Default)]
pub struct MemoryStorage {
    records: DashMap<(String, String), StoredRecord>,
    hash_algo: HashAlgorithm,
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("records", &self.records.len())
            .field("hash_algo", &self.hash_algo)
            .finish()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hash_algorithm(hash_algo: HashAlgorithm) -> Self {
        Self {
            records: DashMap::new(),
            hash_algo,
        }
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algo
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn key(&self, credential: &str, persistent_token: &str) -> (String, String) {
        (credential.to_string(), self.hash_algo.hash(persistent_token))
    }

    fn upsert(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) {
        let key = self.key(credential, persistent_token);
        let record = StoredRecord {
            credential: key.0.clone(),
            persistent_token_hash: key.1.clone(),
            token_hash: self.hash_algo.hash(token),
            expires_at,
        };
        self.records.insert(key, record);
    }
}

#[async_trait]
impl TripletStorage for MemoryStorage {
    async fn find_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
    ) -> StorageResult<TripletLookup> {
        let key = self.key(credential, persistent_token);
        let Some(record) = self.records.get(&key) else {
            return Ok(TripletLookup::NotFound);
        };

        if record.expires_at <= Utc::now() {
            return Ok(TripletLookup::NotFound);
        }

        if self.hash_algo.verify(token, &record.token_hash) {
            Ok(TripletLookup::Found)
        } else {
            Ok(TripletLookup::Invalid)
        }
    }

    async fn store_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.upsert(credential, token, persistent_token, expires_at);
        Ok(())
    }

    async fn replace_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.upsert(credential, token, persistent_token, expires_at);
        Ok(())
    }

    async fn clean_triplet(
        &self,
        credential: &str,
        persistent_token: &str,
    ) -> StorageResult<()> {
        self.records.remove(&self.key(credential, persistent_token));
        Ok(())
    }

    async fn clean_all_triplets(&self, credential: &str) -> StorageResult<()> {
        self.records.retain(|(owner, _), _| owner != credential);
        Ok(())
    }

    async fn clean_expired_tokens(
        &self,
        before: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.records.retain(|_, record| record.expires_at >= before);
        Ok(())
    }
}
