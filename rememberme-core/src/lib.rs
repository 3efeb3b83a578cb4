//! Persistent "remember me" logins built on credential/token triplets.
//!
//! A browser holds a cookie `credential|one_time_token|persistent_token`.
//! The server keeps only salted hashes of both tokens. Each successful
//! login rotates the one-time token, so a stolen cookie works at most once
//! before the legitimate client trips over the mismatch and every device of
//! that credential is logged out.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rememberme_core::{Authenticator, MemoryCookie, MemoryStorage};
//!
//! # async fn demo() -> Result<(), rememberme_core::AuthenticatorError> {
//! let auth = Authenticator::new(Arc::new(MemoryStorage::new()));
//!
//! let mut cookie = MemoryCookie::new();
//! auth.create_cookie("alice@example.org", &mut cookie).await?;
//!
//! let result = auth.login(&mut cookie).await?;
//! assert!(result.is_success());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod authenticator;
pub mod cookie;
pub mod login_result;
pub mod storage;
pub mod token;
pub mod triplet;

pub use authenticator::{Authenticator, AuthenticatorError, AuthenticatorSettings};
pub use cookie::{CookieSink, CookieSource, CookieTransport, MemoryCookie};
pub use login_result::{LoginOutcome, LoginResult};
pub use storage::{
    HashAlgorithm, MemoryStorage, StorageError, StorageResult, TripletLookup,
    TripletStorage, VerifiedStorage,
};
pub use token::{RandomTokenGenerator, TokenError, TokenFormat, TokenGenerator};
pub use triplet::Triplet;

#[cfg(feature = "axum")]
pub use cookie::{CookieOptions, HttpCookie, SameSite};

#[cfg(feature = "file")]
pub use storage::FileStorage;

#[cfg(feature = "postgres")]
pub use storage::{PostgresStorage, PostgresStorageOptions};

#[cfg(feature = "redis")]
pub use storage::RedisStorage;

/// Migrations for the default PostgreSQL layout.
#[cfg(feature = "postgres")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
