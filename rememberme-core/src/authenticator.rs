use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cookie::CookieTransport;
use crate::login_result::LoginResult;
use crate::storage::{StorageError, TripletLookup, TripletStorage};
use crate::token::{RandomTokenGenerator, TokenError, TokenGenerator};
use crate::triplet::Triplet;

#[derive(Debug, Error)]
pub enum AuthenticatorError {
    #[error("triplet storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("token generation failed: {0}")]
    Token(#[from] TokenError),
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

/// Knobs of the login protocol.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatorSettings {
    /// Lifetime granted to a triplet each time it is stored or refreshed.
    pub expire_time: Duration,
    /// Purge every device of a credential when a replayed one-time token
    /// is presented.
    pub clean_stored_tokens_on_invalid_result: bool,
    /// Sweep expired records before every lookup.
    pub clean_expired_tokens_on_login: bool,
    pub token_rotation_enabled: bool,
    /// Appended to both tokens before they reach the storage backend.
    pub salt: String,
}

impl Default for AuthenticatorSettings {
    fn default() -> Self {
        Self {
            expire_time: Duration::weeks(1),
            clean_stored_tokens_on_invalid_result: true,
            clean_expired_tokens_on_login: false,
            token_rotation_enabled: true,
            salt: String::new(),
        }
    }
}

impl fmt::Debug for AuthenticatorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatorSettings")
            .field("expire_time", &self.expire_time)
            .field(
                "clean_stored_tokens_on_invalid_result",
                &self.clean_stored_tokens_on_invalid_result,
            )
            .field(
                "clean_expired_tokens_on_login",
                &self.clean_expired_tokens_on_login,
            )
            .field("token_rotation_enabled", &self.token_rotation_enabled)
            .field("salt", &if self.salt.is_empty() { "" } else { "***" })
            .finish()
    }
}

/// Drives the triplet protocol against a storage backend.
///
/// Holds configuration only; every call works on the cookie it is given, so
/// one instance can serve concurrent requests.
#[derive(Clone)]
pub struct Authenticator {
    storage: Arc<dyn TripletStorage>,
    token_generator: Arc<dyn TokenGenerator>,
    settings: AuthenticatorSettings,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("storage_refs", &Arc::strong_count(&self.storage))
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(storage: Arc<dyn TripletStorage>) -> Self {
        Self {
            storage,
            token_generator: Arc::new(RandomTokenGenerator::default()),
            settings: AuthenticatorSettings::default(),
        }
    }

    pub fn with_token_generator(
        mut self,
        token_generator: Arc<dyn TokenGenerator>,
    ) -> Self {
        self.token_generator = token_generator;
        self
    }

    pub fn with_settings(mut self, settings: AuthenticatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_expire_time(mut self, expire_time: Duration) -> Self {
        self.settings.expire_time = expire_time;
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.settings.salt = salt.into();
        self
    }

    pub fn with_token_rotation(mut self, enabled: bool) -> Self {
        self.settings.token_rotation_enabled = enabled;
        self
    }

    pub fn with_clean_stored_tokens_on_invalid_result(
        mut self,
        enabled: bool,
    ) -> Self {
        self.settings.clean_stored_tokens_on_invalid_result = enabled;
        self
    }

    pub fn with_clean_expired_tokens_on_login(mut self, enabled: bool) -> Self {
        self.settings.clean_expired_tokens_on_login = enabled;
        self
    }

    pub fn set_expire_time(&mut self, expire_time: Duration) {
        self.settings.expire_time = expire_time;
    }

    pub fn set_salt(&mut self, salt: impl Into<String>) {
        self.settings.salt = salt.into();
    }

    pub fn set_token_rotation_enabled(&mut self, enabled: bool) {
        self.settings.token_rotation_enabled = enabled;
    }

    pub fn set_clean_stored_tokens_on_invalid_result(&mut self, enabled: bool) {
        self.settings.clean_stored_tokens_on_invalid_result = enabled;
    }

    pub fn set_clean_expired_tokens_on_login(&mut self, enabled: bool) {
        self.settings.clean_expired_tokens_on_login = enabled;
    }

    pub fn settings(&self) -> &AuthenticatorSettings {
        &self.settings
    }

    pub fn expire_time(&self) -> Duration {
        self.settings.expire_time
    }

    pub fn salt(&self) -> &str {
        &self.settings.salt
    }

    pub fn is_token_rotation_enabled(&self) -> bool {
        self.settings.token_rotation_enabled
    }

    pub fn clean_stored_tokens_on_invalid_result(&self) -> bool {
        self.settings.clean_stored_tokens_on_invalid_result
    }

    pub fn is_clean_expired_tokens_on_login(&self) -> bool {
        self.settings.clean_expired_tokens_on_login
    }

    pub fn storage(&self) -> &Arc<dyn TripletStorage> {
        &self.storage
    }

    /// Try to log in with the cookie of the current request.
    ///
    /// Negative outcomes are reported through [`LoginResult`]; only storage
    /// and token failures are errors. On success the cookie carries a new
    /// one-time token (or the same triplet when rotation is off) with a
    /// refreshed expiry. A replayed one-time token deletes the cookie and,
    /// unless disabled, every stored device of the credential.
    pub async fn login<C>(
        &self,
        cookie: &mut C,
    ) -> Result<LoginResult, AuthenticatorError>
    where
        C: CookieTransport + ?Sized,
    {
        let Some(value) = cookie.value() else {
            return Ok(LoginResult::no_cookie());
        };

        let triplet = Triplet::parse(value);
        if !triplet.is_valid() {
            warn!("rejecting malformed remember-me cookie");
            return Ok(LoginResult::manipulation());
        }

        if self.settings.clean_expired_tokens_on_login {
            self.storage.clean_expired_tokens(Utc::now()).await?;
        }

        let salt = self.settings.salt.as_str();
        let lookup = self
            .storage
            .find_triplet(
                triplet.credential(),
                &triplet.salted_one_time_token(salt),
                &triplet.salted_persistent_token(salt),
            )
            .await?;

        match lookup {
            TripletLookup::Found => {
                let expires_at = Utc::now() + self.settings.expire_time;
                let next = if self.settings.token_rotation_enabled {
                    triplet.rotate(self.token_generator.create_token()?)
                } else {
                    triplet.clone()
                };

                self.storage
                    .replace_triplet(
                        next.credential(),
                        &next.salted_one_time_token(salt),
                        &next.salted_persistent_token(salt),
                        expires_at,
                    )
                    .await?;
                cookie.set_value(&next.to_string());

                debug!(
                    credential = triplet.credential(),
                    rotated = self.settings.token_rotation_enabled,
                    "remember-me login succeeded"
                );
                Ok(LoginResult::success(triplet.credential()))
            }
            TripletLookup::Invalid => {
                cookie.delete_cookie();
                warn!(
                    purge = self.settings.clean_stored_tokens_on_invalid_result,
                    "one-time token mismatch, possible cookie theft"
                );
                debug!(credential = triplet.credential(), "manipulated triplet");

                if self.settings.clean_stored_tokens_on_invalid_result {
                    self.storage
                        .clean_all_triplets(triplet.credential())
                        .await?;
                }
                Ok(LoginResult::manipulation())
            }
            TripletLookup::NotFound => {
                cookie.delete_cookie();
                debug!(
                    credential = triplet.credential(),
                    "no live triplet for cookie"
                );
                Ok(LoginResult::expired())
            }
        }
    }

    /// Issue a brand-new device triplet for `credential` and write it to the
    /// cookie. Call after the user proved their identity some other way.
    pub async fn create_cookie<C>(
        &self,
        credential: &str,
        cookie: &mut C,
    ) -> Result<(), AuthenticatorError>
    where
        C: CookieTransport + ?Sized,
    {
        if credential.is_empty() {
            return Err(AuthenticatorError::InvalidCredential(
                "credential must not be empty".to_string(),
            ));
        }

        let triplet = Triplet::new(
            credential,
            self.token_generator.create_token()?,
            self.token_generator.create_token()?,
        );
        let payload = triplet.to_string();
        if Triplet::parse(&payload) != triplet {
            return Err(AuthenticatorError::InvalidCredential(
                "cookie payload does not round-trip".to_string(),
            ));
        }

        let salt = self.settings.salt.as_str();
        self.storage
            .store_triplet(
                triplet.credential(),
                &triplet.salted_one_time_token(salt),
                &triplet.salted_persistent_token(salt),
                Utc::now() + self.settings.expire_time,
            )
            .await?;
        cookie.set_value(&payload);

        debug!(credential, "issued remember-me cookie");
        Ok(())
    }

    /// Log out the current device. Returns whether a valid triplet was
    /// presented; the cookie is deleted either way.
    pub async fn clear_cookie<C>(
        &self,
        cookie: &mut C,
    ) -> Result<bool, AuthenticatorError>
    where
        C: CookieTransport + ?Sized,
    {
        let triplet = Triplet::parse(cookie.value().unwrap_or_default());
        cookie.delete_cookie();

        if !triplet.is_valid() {
            return Ok(false);
        }

        self.storage
            .clean_triplet(
                triplet.credential(),
                &triplet.salted_persistent_token(&self.settings.salt),
            )
            .await?;
        debug!(credential = triplet.credential(), "cleared remember-me cookie");
        Ok(true)
    }
}
