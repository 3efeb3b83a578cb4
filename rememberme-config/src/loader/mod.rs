mod error;

pub use error::ConfigLoadError;

use once_cell::sync::Lazy;
use std::{fs, path::PathBuf};

use chrono::Duration;
use rememberme_core::{CookieOptions, HashAlgorithm, SameSite, TokenFormat};

use super::{
    models::{
        AuthenticatorConfig, Config, ConfigMetadata, StorageBackend,
        StorageBackendKind, StorageConfig, TokenConfig,
    },
    sources::{EnvConfig, FileConfig, FileCookieConfig, FileStorageConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("rememberme.toml"),
        PathBuf::from("config/rememberme.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

/// Resolves a [`Config`] from defaults, a TOML file and the environment,
/// in increasing order of precedence.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load the env file and resolve against the process environment.
    ///
    /// A missing default `.env` is fine; an explicit `--env-file` must
    /// exist and parse.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|source| {
                    ConfigLoadError::ExplicitEnvFile {
                        path: path.clone(),
                        source,
                    }
                })?;
                true
            }
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        self.resolve(EnvConfig::gather(), env_file_loaded)
    }

    /// Resolve against an explicit set of environment values.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        self.resolve(env, false)
    }

    fn resolve(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No rememberme.toml detected; falling back to environment variables",
                "Pass --config or set REMEMBERME_CONFIG to use a configuration file",
            );
        }

        let config = compose_config(
            file_config.unwrap_or_default(),
            env,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )?;
        warnings.extend(validation::apply_guard_rails(&config)?);

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        // An explicitly named file must exist; default locations are optional.
        let path = match (&self.options.config_path, &env.config_path) {
            (Some(explicit), _) | (None, Some(explicit)) => {
                if !explicit.exists() {
                    return Err(ConfigLoadError::MissingConfig {
                        path: explicit.clone(),
                    });
                }
                explicit.clone()
            }
            (None, None) => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(found) => found.clone(),
                None => return Ok((None, None)),
            },
        };

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> Result<Config, ConfigGuardRailError> {
    let FileConfig {
        authenticator: file_auth,
        token: file_token,
        storage: file_storage,
        cookie: file_cookie,
    } = file;
    let defaults = AuthenticatorConfig::default();

    let expire_time = match env.expire_time.clone().or(file_auth.expire_time) {
        Some(raw) => parse_duration("expire_time", &raw)?,
        None => defaults.expire_time,
    };

    let authenticator = AuthenticatorConfig {
        expire_time,
        clean_on_invalid: flag(
            "REMEMBERME_CLEAN_ON_INVALID",
            env.clean_on_invalid.as_deref(),
            file_auth.clean_on_invalid,
            defaults.clean_on_invalid,
        )?,
        clean_expired_on_login: flag(
            "REMEMBERME_CLEAN_EXPIRED_ON_LOGIN",
            env.clean_expired_on_login.as_deref(),
            file_auth.clean_expired_on_login,
            defaults.clean_expired_on_login,
        )?,
        token_rotation: flag(
            "REMEMBERME_TOKEN_ROTATION",
            env.token_rotation.as_deref(),
            file_auth.token_rotation,
            defaults.token_rotation,
        )?,
        salt: env.salt.clone().or(file_auth.salt).unwrap_or_default(),
    };

    let token_defaults = TokenConfig::default();
    let bytes = match (&env.token_bytes, file_token.bytes) {
        (Some(raw), _) => parse_token_bytes(raw)?,
        (None, Some(bytes)) => parse_token_bytes(&bytes.to_string())?,
        (None, None) => token_defaults.bytes,
    };
    let format = match env.token_format.clone().or(file_token.format) {
        Some(raw) => raw
            .parse::<TokenFormat>()
            .map_err(|_| ConfigGuardRailError::UnsupportedTokenFormat(raw))?,
        None => token_defaults.format,
    };

    let storage = compose_storage(&env, file_storage)?;
    let cookie = compose_cookie(&env, file_cookie, expire_time)?;

    Ok(Config {
        metadata,
        authenticator,
        token: TokenConfig { bytes, format },
        storage,
        cookie,
    })
}

fn compose_storage(
    env: &EnvConfig,
    file: FileStorageConfig,
) -> Result<StorageConfig, ConfigGuardRailError> {
    let hash_algorithm = match env.hash_algorithm.clone().or(file.hash_algorithm) {
        Some(raw) => raw.parse::<HashAlgorithm>()?,
        None => HashAlgorithm::default(),
    };

    let kind = match env.storage_backend.clone().or(file.backend) {
        Some(raw) => raw
            .parse::<StorageBackendKind>()
            .map_err(ConfigGuardRailError::UnknownBackend)?,
        None => StorageBackendKind::default(),
    };

    let backend = match kind {
        StorageBackendKind::Memory => StorageBackend::Memory,
        StorageBackendKind::File => StorageBackend::File {
            path: env.storage_path.clone().or(file.path).ok_or(
                ConfigGuardRailError::MissingStorageSetting {
                    backend: "file",
                    setting: "storage.path or REMEMBERME_STORAGE_PATH",
                },
            )?,
            suffix: file.suffix,
        },
        StorageBackendKind::Postgres => StorageBackend::Postgres {
            url: env.database_url.clone().or(file.url).ok_or(
                ConfigGuardRailError::MissingStorageSetting {
                    backend: "postgres",
                    setting: "storage.url or DATABASE_URL",
                },
            )?,
            table: file.table,
        },
        StorageBackendKind::Redis => StorageBackend::Redis {
            url: env.redis_url.clone().or(file.url).ok_or(
                ConfigGuardRailError::MissingStorageSetting {
                    backend: "redis",
                    setting: "storage.url or REDIS_URL",
                },
            )?,
            key_prefix: file.key_prefix,
        },
    };

    Ok(StorageConfig {
        backend,
        hash_algorithm,
    })
}

fn compose_cookie(
    env: &EnvConfig,
    file: FileCookieConfig,
    lifetime: Duration,
) -> Result<CookieOptions, ConfigGuardRailError> {
    let defaults = CookieOptions::default();
    let same_site = match env.cookie_same_site.clone().or(file.same_site) {
        Some(raw) => raw.parse::<SameSite>()?,
        None => defaults.same_site,
    };

    Ok(CookieOptions {
        name: env.cookie_name.clone().or(file.name).unwrap_or(defaults.name),
        path: file.path.unwrap_or(defaults.path),
        domain: file.domain.or(defaults.domain),
        secure: flag(
            "REMEMBERME_COOKIE_SECURE",
            env.cookie_secure.as_deref(),
            file.secure,
            defaults.secure,
        )?,
        http_only: file.http_only.unwrap_or(defaults.http_only),
        same_site,
        lifetime,
    })
}

fn parse_duration(
    field: &'static str,
    raw: &str,
) -> Result<Duration, ConfigGuardRailError> {
    let invalid = |reason: String| ConfigGuardRailError::InvalidDuration {
        field,
        value: raw.to_string(),
        reason,
    };
    let std_duration =
        humantime::parse_duration(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    if std_duration.is_zero() {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Duration::from_std(std_duration).map_err(|err| invalid(err.to_string()))
}

/// Environment beats file beats default; an unrecognised environment value
/// is an error rather than a fallback.
fn flag(
    field: &'static str,
    env: Option<&str>,
    file: Option<bool>,
    default: bool,
) -> Result<bool, ConfigGuardRailError> {
    match env {
        Some(raw) => parse_bool(raw).ok_or_else(|| ConfigGuardRailError::InvalidBool {
            field,
            value: raw.to_string(),
        }),
        None => Ok(file.unwrap_or(default)),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_token_bytes(raw: &str) -> Result<usize, ConfigGuardRailError> {
    match raw.trim().parse::<usize>() {
        Ok(bytes) if bytes > 0 => Ok(bytes),
        _ => Err(ConfigGuardRailError::InvalidTokenBytes {
            value: raw.to_string(),
        }),
    }
}
