use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub authenticator: FileAuthenticatorConfig,
    #[serde(default)]
    pub token: FileTokenConfig,
    #[serde(default)]
    pub storage: FileStorageConfig,
    #[serde(default)]
    pub cookie: FileCookieConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileAuthenticatorConfig {
    /// Humantime duration, e.g. `"7days"` or `"2w"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_on_invalid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_expired_on_login: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_rotation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileTokenConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileStorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileCookieConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

/// Environment-derived configuration values.
///
/// Typed values are kept as raw strings so the loader can report them
/// instead of silently dropping a typo.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub expire_time: Option<String>,
    pub clean_on_invalid: Option<String>,
    pub clean_expired_on_login: Option<String>,
    pub token_rotation: Option<String>,
    pub salt: Option<String>,
    pub token_bytes: Option<String>,
    pub token_format: Option<String>,
    pub storage_backend: Option<String>,
    pub hash_algorithm: Option<String>,
    pub storage_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub cookie_name: Option<String>,
    pub cookie_secure: Option<String>,
    pub cookie_same_site: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; [`gather`](Self::gather)
    /// passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            config_path: var("REMEMBERME_CONFIG").map(PathBuf::from),
            expire_time: var("REMEMBERME_EXPIRE_TIME"),
            clean_on_invalid: var("REMEMBERME_CLEAN_ON_INVALID"),
            clean_expired_on_login: var("REMEMBERME_CLEAN_EXPIRED_ON_LOGIN"),
            token_rotation: var("REMEMBERME_TOKEN_ROTATION"),
            // An empty salt is a legitimate (if discouraged) value.
            salt: lookup("REMEMBERME_SALT"),
            token_bytes: var("REMEMBERME_TOKEN_BYTES"),
            token_format: var("REMEMBERME_TOKEN_FORMAT"),
            storage_backend: var("REMEMBERME_STORAGE_BACKEND"),
            hash_algorithm: var("REMEMBERME_HASH_ALGORITHM"),
            storage_path: var("REMEMBERME_STORAGE_PATH").map(PathBuf::from),
            database_url: var("DATABASE_URL"),
            redis_url: var("REDIS_URL"),
            cookie_name: var("REMEMBERME_COOKIE_NAME"),
            cookie_secure: var("REMEMBERME_COOKIE_SECURE"),
            cookie_same_site: var("REMEMBERME_COOKIE_SAME_SITE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_variables_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("REMEMBERME_TOKEN_ROTATION", "off"),
            ("REMEMBERME_COOKIE_SECURE", "YES"),
            ("REMEMBERME_STORAGE_PATH", "/var/lib/rememberme"),
            ("REMEMBERME_TOKEN_FORMAT", "   "),
            ("REMEMBERME_SALT", ""),
        ]
        .into_iter()
        .collect();

        let env = EnvConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(env.token_rotation.as_deref(), Some("off"));
        assert_eq!(env.cookie_secure.as_deref(), Some("YES"));
        assert_eq!(env.storage_path, Some(PathBuf::from("/var/lib/rememberme")));
        assert_eq!(env.token_format, None);
        assert_eq!(env.salt.as_deref(), Some(""));
        assert_eq!(env.database_url, None);
    }

    #[test]
    fn rejects_unknown_file_keys() {
        let parsed = toml::from_str::<FileConfig>("[storage]\nbakend = \"file\"\n");
        assert!(parsed.is_err());
    }
}
