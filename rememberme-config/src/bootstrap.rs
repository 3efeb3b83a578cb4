use std::sync::Arc;

use rememberme_core::storage::{
    FileStorage, MemoryStorage, PostgresStorage, PostgresStorageOptions,
    RedisStorage, StorageError, TripletStorage,
};
use rememberme_core::{Authenticator, RandomTokenGenerator, TokenError};
use thiserror::Error;
use tracing::info;

use super::models::{Config, StorageBackend, StorageConfig};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to initialise triplet storage: {0}")]
    Storage(#[from] StorageError),
    #[error("invalid token configuration: {0}")]
    Token(#[from] TokenError),
}

/// Connect the configured backend and prepare it for use.
pub async fn build_storage(
    config: &StorageConfig,
) -> Result<Arc<dyn TripletStorage>, StorageError> {
    let hash_algo = config.hash_algorithm;

    let storage: Arc<dyn TripletStorage> = match &config.backend {
        StorageBackend::Memory => {
            Arc::new(MemoryStorage::with_hash_algorithm(hash_algo))
        }
        StorageBackend::File { path, suffix } => {
            let mut storage =
                FileStorage::new(path).with_hash_algorithm(hash_algo);
            if let Some(suffix) = suffix {
                storage = storage.with_suffix(suffix);
            }
            storage.ensure_directory().await?;
            Arc::new(storage)
        }
        StorageBackend::Postgres { url, table } => {
            let mut options = PostgresStorageOptions::default();
            if let Some(table) = table {
                options = options.with_table(table);
            }
            let storage = PostgresStorage::connect_with_options(url, options)
                .await?
                .with_hash_algorithm(hash_algo);
            storage.ensure_schema().await?;
            Arc::new(storage)
        }
        StorageBackend::Redis { url, key_prefix } => {
            let mut storage =
                RedisStorage::connect(url).await?.with_hash_algorithm(hash_algo);
            if let Some(prefix) = key_prefix {
                storage = storage.with_key_prefix(prefix);
            }
            Arc::new(storage)
        }
    };

    info!(
        backend = %config.backend.kind(),
        hash = %hash_algo,
        "triplet storage initialised"
    );
    Ok(storage)
}

/// Build a ready [`Authenticator`] from a loaded configuration.
pub async fn build_authenticator(
    config: &Config,
) -> Result<Authenticator, BootstrapError> {
    let storage = build_storage(&config.storage).await?;
    let generator =
        RandomTokenGenerator::new(config.token.bytes, config.token.format)?;

    Ok(Authenticator::new(storage)
        .with_token_generator(Arc::new(generator))
        .with_settings(config.authenticator.settings()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthenticatorConfig, ConfigMetadata, TokenConfig};
    use rememberme_core::{CookieOptions, MemoryCookie, TokenFormat};

    #[tokio::test]
    async fn builds_file_backed_authenticator() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            metadata: ConfigMetadata::default(),
            authenticator: AuthenticatorConfig {
                salt: "pepper".into(),
                token_rotation: false,
                ..Default::default()
            },
            token: TokenConfig {
                bytes: 24,
                format: TokenFormat::Base64,
            },
            storage: StorageConfig {
                backend: StorageBackend::File {
                    path: dir.path().join("triplets"),
                    suffix: Some(".json".into()),
                },
                ..Default::default()
            },
            cookie: CookieOptions::default(),
        };

        let auth = build_authenticator(&config).await.unwrap();
        assert_eq!(auth.salt(), "pepper");
        assert!(!auth.is_token_rotation_enabled());

        let mut cookie = MemoryCookie::new();
        auth.create_cookie("alice", &mut cookie).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("triplets"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].as_ref().unwrap().file_name();
        assert!(name.to_string_lossy().ends_with(".json"));
    }

    #[tokio::test]
    async fn rejects_zero_length_tokens() {
        let config = Config {
            metadata: ConfigMetadata::default(),
            authenticator: AuthenticatorConfig::default(),
            token: TokenConfig {
                bytes: 0,
                format: TokenFormat::Hex,
            },
            storage: StorageConfig::default(),
            cookie: CookieOptions::default(),
        };

        assert!(matches!(
            build_authenticator(&config).await,
            Err(BootstrapError::Token(TokenError::ZeroLength))
        ));
    }
}
