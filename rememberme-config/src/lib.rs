//! Configuration for rememberme deployments.
//!
//! [`ConfigLoader`] merges built-in defaults, an optional TOML file and the
//! environment (with `.env` support), then runs guard rails that reject
//! unsafe or inconsistent settings and collect softer warnings.
//! [`bootstrap::build_authenticator`] turns the result into a ready
//! [`Authenticator`](rememberme_core::Authenticator).

pub mod bootstrap;
pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use bootstrap::{BootstrapError, build_authenticator, build_storage};
pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    AuthenticatorConfig, Config, ConfigMetadata, ConfigSummary, StorageBackend,
    StorageBackendKind, StorageConfig, TokenConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
