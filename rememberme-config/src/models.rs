use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use rememberme_core::{
    AuthenticatorSettings, CookieOptions, HashAlgorithm, RandomTokenGenerator,
    SameSite, TokenFormat,
};
use serde::Serialize;

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub metadata: ConfigMetadata,
    pub authenticator: AuthenticatorConfig,
    pub token: TokenConfig,
    pub storage: StorageConfig,
    pub cookie: CookieOptions,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatorConfig {
    pub expire_time: Duration,
    pub clean_on_invalid: bool,
    pub clean_expired_on_login: bool,
    pub token_rotation: bool,
    pub salt: String,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        let settings = AuthenticatorSettings::default();
        Self {
            expire_time: settings.expire_time,
            clean_on_invalid: settings.clean_stored_tokens_on_invalid_result,
            clean_expired_on_login: settings.clean_expired_tokens_on_login,
            token_rotation: settings.token_rotation_enabled,
            salt: settings.salt,
        }
    }
}

impl fmt::Debug for AuthenticatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatorConfig")
            .field("expire_time", &self.expire_time)
            .field("clean_on_invalid", &self.clean_on_invalid)
            .field("clean_expired_on_login", &self.clean_expired_on_login)
            .field("token_rotation", &self.token_rotation)
            .field("salt", &redact(&self.salt))
            .finish()
    }
}

impl AuthenticatorConfig {
    pub fn settings(&self) -> AuthenticatorSettings {
        AuthenticatorSettings {
            expire_time: self.expire_time,
            clean_stored_tokens_on_invalid_result: self.clean_on_invalid,
            clean_expired_tokens_on_login: self.clean_expired_on_login,
            token_rotation_enabled: self.token_rotation,
            salt: self.salt.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenConfig {
    pub bytes: usize,
    pub format: TokenFormat,
}

impl Default for TokenConfig {
    fn default() -> Self {
        let generator = RandomTokenGenerator::default();
        Self {
            bytes: generator.token_bytes(),
            format: generator.format(),
        }
    }
}

/// Backend names accepted in `storage.backend` / `REMEMBERME_STORAGE_BACKEND`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Memory,
    File,
    Postgres,
    Redis,
}

impl StorageBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Postgres => "postgres",
            Self::Redis => "redis",
        }
    }
}

impl fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            _ => Err(value.to_string()),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File {
        path: PathBuf,
        suffix: Option<String>,
    },
    Postgres {
        url: String,
        table: Option<String>,
    },
    Redis {
        url: String,
        key_prefix: Option<String>,
    },
}

impl StorageBackend {
    pub fn kind(&self) -> StorageBackendKind {
        match self {
            Self::Memory => StorageBackendKind::Memory,
            Self::File { .. } => StorageBackendKind::File,
            Self::Postgres { .. } => StorageBackendKind::Postgres,
            Self::Redis { .. } => StorageBackendKind::Redis,
        }
    }
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Connection URLs may embed passwords.
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::File { path, suffix } => f
                .debug_struct("File")
                .field("path", path)
                .field("suffix", suffix)
                .finish(),
            Self::Postgres { table, .. } => f
                .debug_struct("Postgres")
                .field("url", &"***")
                .field("table", table)
                .finish(),
            Self::Redis { key_prefix, .. } => f
                .debug_struct("Redis")
                .field("url", &"***")
                .field("key_prefix", key_prefix)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub hash_algorithm: HashAlgorithm,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

/// Printable view of a [`Config`] with secrets removed.
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
    pub expire_time: String,
    pub clean_on_invalid: bool,
    pub clean_expired_on_login: bool,
    pub token_rotation: bool,
    pub salt: &'static str,
    pub token_bytes: usize,
    pub token_format: &'static str,
    pub storage_backend: StorageBackendKind,
    pub hash_algorithm: &'static str,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_same_site: SameSite,
}

impl Config {
    pub fn summary(&self) -> ConfigSummary {
        let expire_time = self
            .authenticator
            .expire_time
            .to_std()
            .map(|duration| humantime::format_duration(duration).to_string())
            .unwrap_or_else(|_| format!("{}s", self.authenticator.expire_time.num_seconds()));

        ConfigSummary {
            config_path: self.metadata.config_path.clone(),
            env_file_loaded: self.metadata.env_file_loaded,
            expire_time,
            clean_on_invalid: self.authenticator.clean_on_invalid,
            clean_expired_on_login: self.authenticator.clean_expired_on_login,
            token_rotation: self.authenticator.token_rotation,
            salt: redact(&self.authenticator.salt),
            token_bytes: self.token.bytes,
            token_format: self.token.format.as_str(),
            storage_backend: self.storage.backend.kind(),
            hash_algorithm: self.storage.hash_algorithm.as_str(),
            cookie_name: self.cookie.name.clone(),
            cookie_secure: self.cookie.secure,
            cookie_http_only: self.cookie.http_only,
            cookie_same_site: self.cookie.same_site,
        }
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<empty>" } else { "<redacted>" }
}
