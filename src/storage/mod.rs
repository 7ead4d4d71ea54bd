//! Persistence capabilities consumed by the auth core.
//!
//! The core never assumes a storage engine: it talks to these traits, and the
//! backends in [`memory`] and [`postgres`] satisfy them. Every mutation is a
//! single atomic statement in the backend, so the core holds no locks.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

/// A stored user as seen by the auth core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(UserRecord),
    Conflict,
}

#[derive(Debug)]
pub enum UpdateUserOutcome {
    Updated(UserRecord),
    /// Another user already holds the new email.
    Conflict,
    NotFound,
}

/// User storage needed by login, registration and credential updates.
///
/// `find_by_email` returns the hash and the id from one read, so login never
/// pairs a hash with the id of a different row.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<CreateUserOutcome>;

    /// Replace email and password hash of user `id` and touch `updated_at`.
    async fn update_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<UpdateUserOutcome>;
}

/// Server-side record of a refresh token.
///
/// Only the SHA-256 of the raw token is kept; the raw value is handed to the
/// client once and never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: Vec<u8>,
    pub user_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: i64,
    pub revoked_at: Option<i64>,
}

impl RefreshTokenRecord {
    /// A record authorizes a new access token only while unrevoked and unexpired.
    #[must_use]
    pub fn is_usable(&self, now: i64) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
    NotFound,
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<InsertOutcome>;

    async fn find_by_token(&self, token_hash: &[u8]) -> Result<Option<RefreshTokenRecord>>;

    /// Set `revoked_at = now` unless it is already set.
    async fn mark_revoked(&self, token_hash: &[u8], now: i64) -> Result<RevokeOutcome>;
}
