//! In-memory backends for tests and `--dsn memory://`.
//!
//! Each operation takes the lock once, so inserts and revocations are atomic
//! per key exactly like the single-statement Postgres queries.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CreateUserOutcome, InsertOutcome, RefreshTokenRecord, RefreshTokenRepository, RevokeOutcome,
    UpdateUserOutcome, UserDirectory, UserRecord,
};
use crate::auth::jwt::now_unix_seconds;

#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<CreateUserOutcome> {
        let mut users = self.users.write().await;
        if users.contains_key(email) {
            return Ok(CreateUserOutcome::Conflict);
        }
        let now = now_unix_seconds();
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        users.insert(email.to_string(), user.clone());
        Ok(CreateUserOutcome::Created(user))
    }

    async fn update_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<UpdateUserOutcome> {
        let mut users = self.users.write().await;
        if users.get(email).is_some_and(|holder| holder.id != id) {
            return Ok(UpdateUserOutcome::Conflict);
        }
        let Some(old_email) = users
            .values()
            .find(|user| user.id == id)
            .map(|user| user.email.clone())
        else {
            return Ok(UpdateUserOutcome::NotFound);
        };
        let Some(mut user) = users.remove(&old_email) else {
            return Ok(UpdateUserOutcome::NotFound);
        };
        user.email = email.to_string();
        user.password_hash = password_hash.to_string();
        user.updated_at = now_unix_seconds();
        users.insert(email.to_string(), user.clone());
        Ok(UpdateUserOutcome::Updated(user))
    }
}

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenRepository {
    tokens: RwLock<HashMap<Vec<u8>, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, revoked ones included.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryRefreshTokenRepository {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<InsertOutcome> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&record.token_hash) {
            return Ok(InsertOutcome::Duplicate);
        }
        tokens.insert(record.token_hash.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_token(&self, token_hash: &[u8]) -> Result<Option<RefreshTokenRecord>> {
        Ok(self.tokens.read().await.get(token_hash).cloned())
    }

    async fn mark_revoked(&self, token_hash: &[u8], now: i64) -> Result<RevokeOutcome> {
        let mut tokens = self.tokens.write().await;
        let Some(record) = tokens.get_mut(token_hash) else {
            return Ok(RevokeOutcome::NotFound);
        };
        if record.revoked_at.is_some() {
            return Ok(RevokeOutcome::AlreadyRevoked);
        }
        record.revoked_at = Some(now);
        record.updated_at = now;
        Ok(RevokeOutcome::Revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_user_conflicts_on_same_email() -> Result<()> {
        let users = MemoryUserDirectory::new();
        let first = users.create_user("a@example.com", "hash").await?;
        assert!(matches!(first, CreateUserOutcome::Created(_)));
        let second = users.create_user("a@example.com", "other").await?;
        assert!(matches!(second, CreateUserOutcome::Conflict));
        Ok(())
    }

    #[tokio::test]
    async fn update_user_rekeys_by_new_email() -> Result<()> {
        let users = MemoryUserDirectory::new();
        let CreateUserOutcome::Created(user) = users.create_user("b@example.com", "hash").await?
        else {
            anyhow::bail!("expected user to be created");
        };
        users.create_user("taken@example.com", "hash").await?;

        assert!(matches!(
            users.update_user(user.id, "taken@example.com", "new").await?,
            UpdateUserOutcome::Conflict
        ));
        assert!(matches!(
            users.update_user(Uuid::new_v4(), "c@example.com", "new").await?,
            UpdateUserOutcome::NotFound
        ));

        let UpdateUserOutcome::Updated(updated) =
            users.update_user(user.id, "c@example.com", "new").await?
        else {
            anyhow::bail!("expected user to be updated");
        };
        assert_eq!(updated.id, user.id);
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.updated_at >= user.updated_at);
        assert!(users.find_by_email("b@example.com").await?.is_none());
        assert_eq!(
            users
                .find_by_email("c@example.com")
                .await?
                .map(|user| user.password_hash),
            Some("new".to_string())
        );

        // Keeping the same email is not a conflict with oneself.
        assert!(matches!(
            users.update_user(user.id, "c@example.com", "newer").await?,
            UpdateUserOutcome::Updated(_)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn mark_revoked_keeps_first_timestamp() -> Result<()> {
        let repo = MemoryRefreshTokenRepository::new();
        let record = RefreshTokenRecord {
            token_hash: vec![7; 32],
            user_id: Uuid::new_v4(),
            created_at: 10,
            updated_at: 10,
            expires_at: 1_000,
            revoked_at: None,
        };
        assert_eq!(repo.insert(&record).await?, InsertOutcome::Inserted);
        assert_eq!(repo.insert(&record).await?, InsertOutcome::Duplicate);
        assert_eq!(repo.mark_revoked(&record.token_hash, 20).await?, RevokeOutcome::Revoked);
        assert_eq!(
            repo.mark_revoked(&record.token_hash, 30).await?,
            RevokeOutcome::AlreadyRevoked
        );
        let stored = repo.find_by_token(&record.token_hash).await?;
        assert_eq!(stored.and_then(|r| r.revoked_at), Some(20));
        assert_eq!(repo.mark_revoked(&[0; 32], 40).await?, RevokeOutcome::NotFound);
        assert_eq!(repo.len().await, 1);
        Ok(())
    }
}
