use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

use super::{HashAlgorithm, StorageResult, TripletLookup, TripletStorage};

/// Redis-backed triplet storage.
///
/// Keys are `<prefix>:<hex(credential)>:<hash(persistent)>` and carry the
/// one-time token hash as value. Expiry is native (`SET ... EXAT`), so the
/// explicit sweep is a no-op.
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
    key_prefix: String,
    hash_algo: HashAlgorithm,
}

/// `redis_url` with any `user:password@` section removed.
fn without_credentials(redis_url: &str) -> String {
    let Some((scheme, rest)) = redis_url.split_once("://") else {
        return "<redacted>".to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}://{}", &rest[at + 1..]),
        None => redis_url.to_string(),
    }
}

impl fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorage")
            .field("connection", &"ConnectionManager")
            .field("key_prefix", &self.key_prefix)
            .field("hash_algo", &self.hash_algo)
            .finish()
    }
}

impl RedisStorage {
    pub const DEFAULT_KEY_PREFIX: &'static str = "rememberme";

    pub async fn connect(redis_url: &str) -> StorageResult<Self> {
        info!(
            "Connecting to Redis triplet storage at {}",
            without_credentials(redis_url)
        );

        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        info!("Successfully connected to Redis triplet storage");
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            key_prefix: Self::DEFAULT_KEY_PREFIX.to_string(),
            hash_algo: HashAlgorithm::default(),
        }
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_hash_algorithm(mut self, hash_algo: HashAlgorithm) -> Self {
        self.hash_algo = hash_algo;
        self
    }

    fn credential_pattern(&self, credential: &str) -> String {
        format!("{}:{}:*", self.key_prefix, hex::encode(credential.as_bytes()))
    }

    fn key(&self, credential: &str, persistent_token: &str) -> String {
        format!(
            "{}:{}:{}",
            self.key_prefix,
            hex::encode(credential.as_bytes()),
            self.hash_algo.hash(persistent_token)
        )
    }

    async fn write(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let key = self.key(credential, persistent_token);
        // EXAT needs a positive timestamp; anything earlier expires at once.
        let expire_at = expires_at.timestamp().max(1);
        let mut conn = self.conn.clone();

        redis::cmd("SET")
            .arg(&key)
            .arg(self.hash_algo.hash(token))
            .arg("EXAT")
            .arg(expire_at)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl TripletStorage for RedisStorage {
    async fn find_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
    ) -> StorageResult<TripletLookup> {
        let mut conn = self.conn.clone();
        let stored: Option<String> =
            conn.get(self.key(credential, persistent_token)).await?;

        let Some(stored) = stored else {
            return Ok(TripletLookup::NotFound);
        };

        if self.hash_algo.verify(token, &stored) {
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
        self.write(credential, token, persistent_token, expires_at)
            .await
    }

    /// A single `SET` overwrites value and expiry atomically.
    async fn replace_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.write(credential, token, persistent_token, expires_at)
            .await
    }

    async fn clean_triplet(
        &self,
        credential: &str,
        persistent_token: &str,
    ) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.key(credential, persistent_token))
            .await?;
        Ok(())
    }

    async fn clean_all_triplets(&self, credential: &str) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> =
            conn.keys(self.credential_pattern(credential)).await?;

        if !keys.is_empty() {
            debug!(count = keys.len(), "removing all triplet keys of credential");
            conn.del::<_, ()>(keys).await?;
        }
        Ok(())
    }

    async fn clean_expired_tokens(
        &self,
        _before: DateTime<Utc>,
    ) -> StorageResult<()> {
        Ok(())
    }
}
