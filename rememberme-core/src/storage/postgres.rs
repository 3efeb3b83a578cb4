use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::PgPool;
use tracing::{debug, info};

use super::{
    HashAlgorithm, StorageError, StorageResult, TripletLookup, TripletStorage,
};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$")
        .expect("identifier pattern is valid")
});

/// Table and column names used by [`PostgresStorage`].
///
/// The defaults match the bundled migration. Names are interpolated into
/// SQL, so they are validated as plain identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresStorageOptions {
    pub table: String,
    pub credential_column: String,
    pub token_column: String,
    pub persistent_token_column: String,
    pub expires_column: String,
}

impl Default for PostgresStorageOptions {
    fn default() -> Self {
        Self {
            table: "rememberme_tokens".to_string(),
            credential_column: "credential".to_string(),
            token_column: "token".to_string(),
            persistent_token_column: "persistent_token".to_string(),
            expires_column: "expires".to_string(),
        }
    }
}

impl PostgresStorageOptions {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn validate(&self) -> StorageResult<()> {
        for (field, value) in [
            ("table", &self.table),
            ("credential column", &self.credential_column),
            ("token column", &self.token_column),
            ("persistent token column", &self.persistent_token_column),
            ("expires column", &self.expires_column),
        ] {
            if !IDENTIFIER.is_match(value) {
                return Err(StorageError::InvalidConfiguration(format!(
                    "{field} `{value}` is not a valid SQL identifier"
                )));
            }
        }
        Ok(())
    }
}

/// Prepared statement texts, built once from validated options.
#[derive(Debug, Clone)]
struct Statements {
    find: String,
    insert: String,
    upsert: String,
    delete_one: String,
    delete_all: String,
    delete_expired: String,
    create_table: String,
    create_index: String,
}

impl Statements {
    fn new(o: &PostgresStorageOptions) -> Self {
        let PostgresStorageOptions {
            table,
            credential_column: cred,
            token_column: token,
            persistent_token_column: persistent,
            expires_column: expires,
        } = o;

        Self {
            find: format!(
                "SELECT {token} FROM {table} WHERE {cred} = $1 AND {persistent} = $2 AND {expires} > $3 LIMIT 1"
            ),
            insert: format!(
                "INSERT INTO {table} ({cred}, {token}, {persistent}, {expires}) VALUES ($1, $2, $3, $4)"
            ),
            upsert: format!(
                "INSERT INTO {table} ({cred}, {token}, {persistent}, {expires}) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT ({cred}, {persistent}) DO UPDATE SET {token} = EXCLUDED.{token}, {expires} = EXCLUDED.{expires}"
            ),
            delete_one: format!(
                "DELETE FROM {table} WHERE {cred} = $1 AND {persistent} = $2"
            ),
            delete_all: format!("DELETE FROM {table} WHERE {cred} = $1"),
            delete_expired: format!("DELETE FROM {table} WHERE {expires} < $1"),
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 {cred} TEXT NOT NULL, \
                 {token} TEXT NOT NULL, \
                 {persistent} TEXT NOT NULL, \
                 {expires} TIMESTAMPTZ NOT NULL, \
                 PRIMARY KEY ({cred}, {persistent}))"
            ),
            create_index: format!(
                "CREATE INDEX IF NOT EXISTS {table}_{expires}_idx ON {table} ({expires})"
            ),
        }
    }
}

/// PostgreSQL-backed triplet storage.
///
/// Requires a unique key on `(credential, persistent_token)`; rotation is
/// an upsert on that key inside a transaction.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
    hash_algo: HashAlgorithm,
    options: PostgresStorageOptions,
    sql: Statements,
}

impl fmt::Debug for PostgresStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table", &self.options.table)
            .field("hash_algo", &self.hash_algo)
            .finish()
    }
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        let options = PostgresStorageOptions::default();
        let sql = Statements::new(&options);
        Self {
            pool,
            hash_algo: HashAlgorithm::default(),
            options,
            sql,
        }
    }

    pub fn with_options(
        pool: PgPool,
        options: PostgresStorageOptions,
    ) -> StorageResult<Self> {
        options.validate()?;
        let sql = Statements::new(&options);
        Ok(Self {
            pool,
            hash_algo: HashAlgorithm::default(),
            options,
            sql,
        })
    }

    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, PostgresStorageOptions::default())
            .await
    }

    pub async fn connect_with_options(
        database_url: &str,
        options: PostgresStorageOptions,
    ) -> StorageResult<Self> {
        options.validate()?;
        info!(table = %options.table, "Connecting to PostgreSQL triplet storage");
        let pool = PgPool::connect(database_url).await?;
        Self::with_options(pool, options)
    }

    pub fn with_hash_algorithm(mut self, hash_algo: HashAlgorithm) -> Self {
        self.hash_algo = hash_algo;
        self
    }

    pub fn options(&self) -> &PostgresStorageOptions {
        &self.options
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the configured table and expiry index if they do not exist.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&self.sql.create_table).execute(&mut *tx).await?;
        sqlx::query(&self.sql.create_index).execute(&mut *tx).await?;
        tx.commit().await?;
        info!(table = %self.options.table, "triplet table ready");
        Ok(())
    }
}

#[async_trait]
impl TripletStorage for PostgresStorage {
    async fn find_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
    ) -> StorageResult<TripletLookup> {
        let stored: Option<String> = sqlx::query_scalar(&self.sql.find)
            .bind(credential)
            .bind(self.hash_algo.hash(persistent_token))
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

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
        sqlx::query(&self.sql.insert)
            .bind(credential)
            .bind(self.hash_algo.hash(token))
            .bind(self.hash_algo.hash(persistent_token))
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await?;
        sqlx::query(&self.sql.upsert)
            .bind(credential)
            .bind(self.hash_algo.hash(token))
            .bind(self.hash_algo.hash(persistent_token))
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn clean_triplet(
        &self,
        credential: &str,
        persistent_token: &str,
    ) -> StorageResult<()> {
        sqlx::query(&self.sql.delete_one)
            .bind(credential)
            .bind(self.hash_algo.hash(persistent_token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clean_all_triplets(&self, credential: &str) -> StorageResult<()> {
        let result = sqlx::query(&self.sql.delete_all)
            .bind(credential)
            .execute(&self.pool)
            .await?;
        debug!(removed = result.rows_affected(), "removed all triplets of credential");
        Ok(())
    }

    async fn clean_expired_tokens(
        &self,
        before: DateTime<Utc>,
    ) -> StorageResult<()> {
        let result = sqlx::query(&self.sql.delete_expired)
            .bind(before)
            .execute(&self.pool)
            .await?;
        debug!(removed = result.rows_affected(), "swept expired triplets");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsafe_identifiers() {
        let options = PostgresStorageOptions::default()
            .with_table("tokens; DROP TABLE users");
        assert!(matches!(
            options.validate(),
            Err(StorageError::InvalidConfiguration(_))
        ));
        assert!(PostgresStorageOptions::default().validate().is_ok());
    }

    #[test]
    fn statements_use_configured_names() {
        let options = PostgresStorageOptions {
            table: "auth_cookies".into(),
            credential_column: "user_id".into(),
            ..Default::default()
        };
        let sql = Statements::new(&options);
        assert!(sql.find.starts_with("SELECT token FROM auth_cookies WHERE user_id = $1"));
        assert!(sql.upsert.contains("ON CONFLICT (user_id, persistent_token)"));
        assert!(sql.delete_expired.ends_with("WHERE expires < $1"));
    }
}
