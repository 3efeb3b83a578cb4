use rememberme_core::SameSite;
use rememberme_core::cookie::{InvalidCookieOptions, InvalidSameSite};
use rememberme_core::storage::UnsupportedHashAlgorithm;
use thiserror::Error;

use super::models::{Config, StorageBackend};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error(transparent)]
    UnsupportedHashAlgorithm(#[from] UnsupportedHashAlgorithm),
    #[error("unsupported token format `{0}` (expected hex, plain or base64)")]
    UnsupportedTokenFormat(String),
    #[error("token length `{value}` is not a positive number of bytes")]
    InvalidTokenBytes { value: String },
    #[error("{field} `{value}` is not a valid duration: {reason}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("{field} `{value}` is not a boolean (expected true/false, yes/no, on/off or 1/0)")]
    InvalidBool { field: &'static str, value: String },
    #[error(transparent)]
    InvalidSameSite(#[from] InvalidSameSite),
    #[error("unknown storage backend `{0}` (expected memory, file, postgres or redis)")]
    UnknownBackend(String),
    #[error("storage backend `{backend}` requires {setting}")]
    MissingStorageSetting {
        backend: &'static str,
        setting: &'static str,
    },
    #[error(transparent)]
    InvalidCookie(#[from] InvalidCookieOptions),
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Checks a composed configuration. Hard errors abort loading; softer
/// concerns come back as warnings.
pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    config.cookie.validate()?;

    if config.authenticator.salt.is_empty() {
        warnings.push_with_hint(
            "REMEMBERME_SALT is empty; stored hashes are unsalted",
            "Set a random, deployment-specific salt; changing it later invalidates every cookie",
        );
    }

    if !config.cookie.secure {
        warnings.push_with_hint(
            "Remember-me cookie is sent without the Secure attribute",
            "Set REMEMBERME_COOKIE_SECURE=true when serving over HTTPS",
        );
        if config.cookie.same_site == SameSite::None {
            warnings.push(
                "SameSite=None without Secure; browsers will reject the cookie",
            );
        }
    }

    if matches!(config.storage.backend, StorageBackend::Memory) {
        warnings.push_with_hint(
            "In-memory triplet storage loses every cookie on restart",
            "Use the file, postgres or redis backend outside of tests",
        );
    }

    if !config.authenticator.clean_on_invalid {
        warnings.push(
            "Cleaning on invalid result is disabled; a replayed cookie will not log out other devices",
        );
    }

    Ok(warnings)
}
