//! Opaque refresh tokens with server-side revocation.
//!
//! Flow Overview: `mint` draws 256 bits from the OS RNG, `register` stores the
//! SHA-256 of the raw value with an expiry, `resolve` looks the hash back up and
//! `revoke` stamps `revoked_at` once. Records are never deleted.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use uuid::Uuid;

use super::error::{AuthError, UnauthenticatedReason};
use super::jwt::now_unix_seconds;
use crate::storage::{InsertOutcome, RefreshTokenRecord, RefreshTokenRepository, RevokeOutcome};

/// Raw refresh tokens carry 32 bytes of entropy, hex encoded.
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Hash a refresh token so raw values never touch the database.
pub(crate) fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Run a storage call under the configured deadline.
pub(crate) async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            error!("Storage call failed: {err:#}");
            Err(AuthError::StorageFailure(err))
        }
        Err(_) => {
            error!("Storage call timed out after {timeout:?}");
            Err(AuthError::StorageFailure(anyhow::anyhow!(
                "storage call timed out after {timeout:?}"
            )))
        }
    }
}

#[derive(Clone)]
pub struct RefreshTokenStore {
    repository: Arc<dyn RefreshTokenRepository>,
    timeout: Duration,
}

impl std::fmt::Debug for RefreshTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RefreshTokenStore {
    #[must_use]
    pub fn new(repository: Arc<dyn RefreshTokenRepository>, timeout: Duration) -> Self {
        Self {
            repository,
            timeout,
        }
    }

    /// Create a new raw refresh token.
    ///
    /// # Errors
    /// Returns `EntropyFailure` if the OS RNG cannot be read.
    pub fn mint() -> Result<String, AuthError> {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut bytes).map_err(|err| {
            error!("Failed to read from the OS RNG: {err}");
            AuthError::EntropyFailure
        })?;
        Ok(hex::encode(bytes))
    }

    /// Persist `raw` for `user_id`, expiring `ttl_seconds` from now.
    ///
    /// Returns `false` if a record with the same token already exists; the
    /// caller mints a fresh value in that case.
    ///
    /// # Errors
    /// Returns `StorageFailure` if the insert fails or times out.
    pub async fn register(
        &self,
        raw: &str,
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<bool, AuthError> {
        let now = now_unix_seconds();
        let record = RefreshTokenRecord {
            token_hash: hash_refresh_token(raw),
            user_id,
            created_at: now,
            updated_at: now,
            expires_at: now.saturating_add(ttl_seconds),
            revoked_at: None,
        };
        let outcome = bounded(self.timeout, self.repository.insert(&record)).await?;
        Ok(outcome == InsertOutcome::Inserted)
    }

    /// Look up the record behind `raw`.
    ///
    /// # Errors
    /// Returns `Unauthenticated(RefreshTokenNotFound)` if no record exists and
    /// `StorageFailure` if the lookup fails.
    pub async fn resolve(&self, raw: &str) -> Result<RefreshTokenRecord, AuthError> {
        let token_hash = hash_refresh_token(raw);
        bounded(self.timeout, self.repository.find_by_token(&token_hash))
            .await?
            .ok_or(AuthError::Unauthenticated(
                UnauthenticatedReason::RefreshTokenNotFound,
            ))
    }

    /// Mark `raw` revoked. Revoking twice is not an error and keeps the first
    /// revocation time.
    ///
    /// # Errors
    /// Returns `Unauthenticated(RefreshTokenNotFound)` if no record exists and
    /// `StorageFailure` if the update fails.
    pub async fn revoke(&self, raw: &str) -> Result<RevokeOutcome, AuthError> {
        let token_hash = hash_refresh_token(raw);
        let outcome = bounded(
            self.timeout,
            self.repository
                .mark_revoked(&token_hash, now_unix_seconds()),
        )
        .await?;
        match outcome {
            RevokeOutcome::NotFound => Err(AuthError::Unauthenticated(
                UnauthenticatedReason::RefreshTokenNotFound,
            )),
            outcome => Ok(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryRefreshTokenRepository;
    use anyhow::Result;
    use async_trait::async_trait;

    fn store() -> (RefreshTokenStore, Arc<MemoryRefreshTokenRepository>) {
        let repo = Arc::new(MemoryRefreshTokenRepository::new());
        (
            RefreshTokenStore::new(repo.clone(), Duration::from_secs(5)),
            repo,
        )
    }

    #[test]
    fn mint_is_64_lowercase_hex() -> Result<(), AuthError> {
        let token = RefreshTokenStore::mint()?;
        assert_eq!(token.len(), REFRESH_TOKEN_BYTES * 2);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_ne!(token, RefreshTokenStore::mint()?);
        Ok(())
    }

    #[test]
    fn hash_refresh_token_stable() {
        let first = hash_refresh_token("token");
        assert_eq!(first, hash_refresh_token("token"));
        assert_ne!(first, hash_refresh_token("other"));
        assert_eq!(first.len(), 32);
    }

    #[tokio::test]
    async fn register_then_resolve() -> Result<()> {
        let (store, repo) = store();
        let raw = RefreshTokenStore::mint()?;
        let user = Uuid::new_v4();
        assert!(store.register(&raw, user, 60 * 60).await?);

        let record = store.resolve(&raw).await?;
        assert_eq!(record.user_id, user);
        assert_eq!(record.revoked_at, None);
        assert!(record.is_usable(now_unix_seconds()));
        // The raw value is never what gets stored.
        assert_ne!(record.token_hash, raw.as_bytes());
        assert_eq!(repo.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn register_reports_duplicates() -> Result<()> {
        let (store, _) = store();
        let user = Uuid::new_v4();
        assert!(store.register("same", user, 60).await?);
        assert!(!store.register("same", user, 60).await?);
        Ok(())
    }

    #[tokio::test]
    async fn resolve_unknown_is_not_found() {
        let (store, _) = store();
        let result = store.resolve("missing").await;
        assert_eq!(
            result.err().and_then(|err| err.reason()),
            Some(UnauthenticatedReason::RefreshTokenNotFound)
        );
    }

    #[tokio::test]
    async fn expired_registration_is_not_usable() -> Result<()> {
        let (store, _) = store();
        let raw = RefreshTokenStore::mint()?;
        store.register(&raw, Uuid::new_v4(), -1).await?;
        let record = store.resolve(&raw).await?;
        assert_eq!(record.revoked_at, None);
        assert!(!record.is_usable(now_unix_seconds()));
        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_idempotent() -> Result<()> {
        let (store, _) = store();
        let raw = RefreshTokenStore::mint()?;
        store.register(&raw, Uuid::new_v4(), 60).await?;

        assert_eq!(store.revoke(&raw).await?, RevokeOutcome::Revoked);
        let first = store.resolve(&raw).await?.revoked_at;
        assert!(first.is_some());

        assert_eq!(store.revoke(&raw).await?, RevokeOutcome::AlreadyRevoked);
        let record = store.resolve(&raw).await?;
        assert_eq!(record.revoked_at, first);
        assert!(!record.is_usable(now_unix_seconds()));
        Ok(())
    }

    #[tokio::test]
    async fn revoke_unknown_is_not_found() {
        let (store, _) = store();
        let result = store.revoke("missing").await;
        assert!(matches!(
            result,
            Err(AuthError::Unauthenticated(
                UnauthenticatedReason::RefreshTokenNotFound
            ))
        ));
    }

    struct StalledRepository;

    #[async_trait]
    impl RefreshTokenRepository for StalledRepository {
        async fn insert(&self, _record: &RefreshTokenRecord) -> Result<InsertOutcome> {
            std::future::pending().await
        }

        async fn find_by_token(&self, _token_hash: &[u8]) -> Result<Option<RefreshTokenRecord>> {
            std::future::pending().await
        }

        async fn mark_revoked(&self, _token_hash: &[u8], _now: i64) -> Result<RevokeOutcome> {
            Err(anyhow::anyhow!("connection reset"))
        }
    }

    #[tokio::test]
    async fn stalled_storage_times_out() {
        let store = RefreshTokenStore::new(Arc::new(StalledRepository), Duration::from_millis(50));
        let result = store.resolve("anything").await;
        assert!(matches!(result, Err(AuthError::StorageFailure(_))));
        let result = store.register("anything", Uuid::new_v4(), 60).await;
        assert!(matches!(result, Err(AuthError::StorageFailure(_))));
    }

    #[tokio::test]
    async fn storage_errors_propagate() {
        let store = RefreshTokenStore::new(Arc::new(StalledRepository), Duration::from_secs(1));
        let result = store.revoke("anything").await;
        assert!(matches!(result, Err(AuthError::StorageFailure(_))));
    }
}
