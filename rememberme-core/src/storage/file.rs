use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    HashAlgorithm, StorageError, StorageResult, TripletLookup, TripletStorage,
};

/// On-disk payload of one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileRecord {
    token_hash: String,
    expires_at: DateTime<Utc>,
}

/// One file per device: `<sha256(credential)>.<hash(persistent)><suffix>`.
///
/// Both parts are fixed-width hex digests, so a file name stays well under
/// the usual 255-byte limit whatever the credential, and a credential can
/// neither escape the directory nor prefix-match another one. The
/// credential digest is always SHA-256; the configured algorithm only
/// applies to tokens. Writes go to a short temporary file in the same
/// directory that is renamed over the target, which keeps replacement
/// atomic per key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    suffix: String,
    hash_algo: HashAlgorithm,
}

impl FileStorage {
    pub const DEFAULT_SUFFIX: &'static str = ".txt";
    const TEMP_MARKER: &'static str = ".tmp-";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            suffix: Self::DEFAULT_SUFFIX.to_string(),
            hash_algo: HashAlgorithm::default(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_hash_algorithm(mut self, hash_algo: HashAlgorithm) -> Self {
        self.hash_algo = hash_algo;
        self
    }

    /// Create the storage directory if needed.
    pub async fn ensure_directory(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.path)
            .await
            .map_err(|err| StorageError::io(&self.path, err))?;
        info!(path = %self.path.display(), "file triplet storage ready");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn credential_prefix(credential: &str) -> String {
        format!("{}.", HashAlgorithm::Sha256.hash(credential))
    }

    fn file_name(&self, credential: &str, persistent_token: &str) -> PathBuf {
        self.path.join(format!(
            "{}{}{}",
            Self::credential_prefix(credential),
            self.hash_algo.hash(persistent_token),
            self.suffix
        ))
    }

    async fn read_record(path: &Path) -> StorageResult<Option<FileRecord>> {
        match fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(contents.trim())?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(path, err)),
        }
    }

    async fn write_record(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let target = self.file_name(credential, persistent_token);
        let record = FileRecord {
            token_hash: self.hash_algo.hash(token),
            expires_at,
        };
        let payload = serde_json::to_vec(&record)?;

        let temp = self
            .path
            .join(format!("{}{}", Self::TEMP_MARKER, Uuid::new_v4()));

        fs::write(&temp, payload)
            .await
            .map_err(|err| StorageError::io(&temp, err))?;

        if let Err(err) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::io(&target, err));
        }

        Ok(())
    }

    async fn remove_if_present(path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(path, err)),
        }
    }

    /// Record files (temporary files excluded) whose name starts with
    /// `prefix`.
    async fn record_files(&self, prefix: &str) -> StorageResult<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.path)
            .await
            .map_err(|err| StorageError::io(&self.path, err))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StorageError::io(&self.path, err))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(prefix)
                && name.ends_with(&self.suffix)
                && !name.starts_with(Self::TEMP_MARKER)
            {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl TripletStorage for FileStorage {
    async fn find_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
    ) -> StorageResult<TripletLookup> {
        let path = self.file_name(credential, persistent_token);
        let Some(record) = Self::read_record(&path).await? else {
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
        self.write_record(credential, token, persistent_token, expires_at)
            .await
    }

    async fn replace_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.write_record(credential, token, persistent_token, expires_at)
            .await
    }

    async fn clean_triplet(
        &self,
        credential: &str,
        persistent_token: &str,
    ) -> StorageResult<()> {
        Self::remove_if_present(&self.file_name(credential, persistent_token))
            .await
    }

    async fn clean_all_triplets(&self, credential: &str) -> StorageResult<()> {
        let files = self
            .record_files(&Self::credential_prefix(credential))
            .await?;
        debug!(count = files.len(), "removing all triplet files of credential");
        for file in files {
            Self::remove_if_present(&file).await?;
        }
        Ok(())
    }

    async fn clean_expired_tokens(
        &self,
        before: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut removed = 0usize;
        for file in self.record_files("").await? {
            // A concurrent clean may have removed the file already.
            let Some(record) = Self::read_record(&file).await? else {
                continue;
            };
            if record.expires_at < before {
                Self::remove_if_present(&file).await?;
                removed += 1;
            }
        }
        debug!(removed, "swept expired triplet files");
        Ok(())
    }
}
