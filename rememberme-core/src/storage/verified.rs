use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{StorageResult, TripletLookup, TripletStorage};

/// Application hook deciding whether a credential may still log in (e.g. the
/// account was disabled or deleted since the cookie was issued).
pub type CredentialVerifier = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Wraps a backend so that lookups for rejected credentials report
/// [`TripletLookup::NotFound`] without touching the inner store.
pub struct VerifiedStorage<S> {
    inner: S,
    verifier: CredentialVerifier,
}

impl<S: fmt::Debug> fmt::Debug for VerifiedStorage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedStorage")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S> VerifiedStorage<S> {
    pub fn new<F>(inner: S, verifier: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            inner,
            verifier: Arc::new(verifier),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: TripletStorage> TripletStorage for VerifiedStorage<S> {
    async fn find_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
    ) -> StorageResult<TripletLookup> {
        if !(self.verifier)(credential) {
            debug!(credential, "credential rejected by verifier");
            return Ok(TripletLookup::NotFound);
        }
        self.inner
            .find_triplet(credential, token, persistent_token)
            .await
    }

    async fn store_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.inner
            .store_triplet(credential, token, persistent_token, expires_at)
            .await
    }

    async fn replace_triplet(
        &self,
        credential: &str,
        token: &str,
        persistent_token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.inner
            .replace_triplet(credential, token, persistent_token, expires_at)
            .await
    }

    async fn clean_triplet(
        &self,
        credential: &str,
        persistent_token: &str,
    ) -> StorageResult<()> {
        self.inner.clean_triplet(credential, persistent_token).await
    }

    async fn clean_all_triplets(&self, credential: &str) -> StorageResult<()> {
        self.inner.clean_all_triplets(credential).await
    }

    async fn clean_expired_tokens(
        &self,
        before: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.inner.clean_expired_tokens(before).await
    }
}
