//! Postgres backends on `sqlx`.
//!
//! Timestamps are `TIMESTAMPTZ` in the database and unix seconds in Rust.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use super::{
    CreateUserOutcome, InsertOutcome, RefreshTokenRecord, RefreshTokenRepository, RevokeOutcome,
    UpdateUserOutcome, UserDirectory, UserRecord,
};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Open a pool against `dsn`.
///
/// # Errors
/// Returns an error if the database is unreachable.
pub async fn connect(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")
}

/// Apply `sql/schema.sql`. Every statement is idempotent.
///
/// # Errors
/// Returns an error naming the first statement that failed.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, email, hashed_password,
                   EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix,
                   EXTRACT(EPOCH FROM updated_at)::BIGINT AS updated_at_unix
            FROM users
            WHERE email = $1
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup user")?;

        Ok(row.map(|row| UserRecord {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("hashed_password"),
            created_at: row.get("created_at_unix"),
            updated_at: row.get("updated_at_unix"),
        }))
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<CreateUserOutcome> {
        let query = r"
            INSERT INTO users (email, hashed_password)
            VALUES ($1, $2)
            RETURNING id,
                      EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix,
                      EXTRACT(EPOCH FROM updated_at)::BIGINT AS updated_at_unix
        ";
        let row = sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match row {
            Ok(row) => Ok(CreateUserOutcome::Created(UserRecord {
                id: row.get("id"),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: row.get("created_at_unix"),
                updated_at: row.get("updated_at_unix"),
            })),
            Err(err) if is_unique_violation(&err) => Ok(CreateUserOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn update_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<UpdateUserOutcome> {
        let query = r"
            UPDATE users
            SET email = $2, hashed_password = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix,
                      EXTRACT(EPOCH FROM updated_at)::BIGINT AS updated_at_unix
        ";
        let row = sqlx::query(query)
            .bind(id)
            .bind(email)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await;

        match row {
            Ok(Some(row)) => Ok(UpdateUserOutcome::Updated(UserRecord {
                id,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: row.get("created_at_unix"),
                updated_at: row.get("updated_at_unix"),
            })),
            Ok(None) => Ok(UpdateUserOutcome::NotFound),
            Err(err) if is_unique_violation(&err) => Ok(UpdateUserOutcome::Conflict),
            Err(err) => Err(err).context("failed to update user"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO refresh_tokens
                (token_hash, user_id, created_at, updated_at, expires_at, revoked_at)
            VALUES ($1, $2, to_timestamp($3), to_timestamp($4), to_timestamp($5), NULL)
            ON CONFLICT (token_hash) DO NOTHING
        ";
        let result = sqlx::query(query)
            .bind(&record.token_hash)
            .bind(record.user_id)
            .bind(record.created_at as f64)
            .bind(record.updated_at as f64)
            .bind(record.expires_at as f64)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert refresh token")?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn find_by_token(&self, token_hash: &[u8]) -> Result<Option<RefreshTokenRecord>> {
        let query = r"
            SELECT token_hash, user_id,
                   EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix,
                   EXTRACT(EPOCH FROM updated_at)::BIGINT AS updated_at_unix,
                   EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix,
                   EXTRACT(EPOCH FROM revoked_at)::BIGINT AS revoked_at_unix
            FROM refresh_tokens
            WHERE token_hash = $1
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup refresh token")?;

        Ok(row.map(|row| RefreshTokenRecord {
            token_hash: row.get("token_hash"),
            user_id: row.get::<Uuid, _>("user_id"),
            created_at: row.get("created_at_unix"),
            updated_at: row.get("updated_at_unix"),
            expires_at: row.get("expires_at_unix"),
            revoked_at: row.get("revoked_at_unix"),
        }))
    }

    async fn mark_revoked(&self, token_hash: &[u8], now: i64) -> Result<RevokeOutcome> {
        // The guard on revoked_at keeps the first revocation time.
        let query = r"
            UPDATE refresh_tokens
            SET revoked_at = to_timestamp($2), updated_at = to_timestamp($2)
            WHERE token_hash = $1 AND revoked_at IS NULL
        ";
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(now as f64)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to revoke refresh token")?;

        if result.rows_affected() > 0 {
            return Ok(RevokeOutcome::Revoked);
        }

        let query = "SELECT 1 FROM refresh_tokens WHERE token_hash = $1";
        let exists = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup refresh token")?
            .is_some();

        if exists {
            Ok(RevokeOutcome::AlreadyRevoked)
        } else {
            Ok(RevokeOutcome::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::now_unix_seconds;

    #[test]
    fn split_sql_statements_skips_comments() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS users"));
        assert!(statements
            .iter()
            .all(|statement| statement.ends_with(';')));
    }

    #[test]
    fn refresh_tokens_are_not_dropped_with_their_user() {
        let statements = split_sql_statements(SCHEMA_SQL);
        let refresh_tokens = statements
            .iter()
            .find(|statement| statement.contains("CREATE TABLE IF NOT EXISTS refresh_tokens"));
        assert!(refresh_tokens.is_some_and(|statement| statement.contains("ON DELETE RESTRICT")));
        assert!(!SCHEMA_SQL.contains("CASCADE"));
    }

    // Runs only against a live database: CHIRPY_TEST_DSN=postgres://...
    async fn test_pool() -> Option<PgPool> {
        let Ok(dsn) = std::env::var("CHIRPY_TEST_DSN") else {
            eprintln!("Skipping integration test: CHIRPY_TEST_DSN not set");
            return None;
        };
        let pool = connect(&dsn).await.ok()?;
        apply_schema(&pool).await.ok()?;
        Some(pool)
    }

    #[tokio::test]
    async fn postgres_user_directory_round_trip() -> Result<()> {
        let Some(pool) = test_pool().await else {
            return Ok(());
        };
        let users = PgUserDirectory::new(pool);
        let email = format!("{}@example.com", Uuid::new_v4());

        let CreateUserOutcome::Created(user) = users.create_user(&email, "hash").await? else {
            anyhow::bail!("expected user to be created");
        };
        assert!(matches!(
            users.create_user(&email, "hash").await?,
            CreateUserOutcome::Conflict
        ));
        assert_eq!(users.find_by_email(&email).await?.map(|u| u.id), Some(user.id));

        let new_email = format!("{}@example.com", Uuid::new_v4());
        let UpdateUserOutcome::Updated(updated) =
            users.update_user(user.id, &new_email, "new-hash").await?
        else {
            anyhow::bail!("expected user to be updated");
        };
        assert_eq!(updated.created_at, user.created_at);
        assert!(users.find_by_email(&email).await?.is_none());
        assert_eq!(
            users.find_by_email(&new_email).await?.map(|u| u.password_hash),
            Some("new-hash".to_string())
        );
        assert!(matches!(
            users.update_user(Uuid::new_v4(), &email, "hash").await?,
            UpdateUserOutcome::NotFound
        ));
        Ok(())
    }

    #[tokio::test]
    async fn postgres_refresh_tokens_revoke_once() -> Result<()> {
        let Some(pool) = test_pool().await else {
            return Ok(());
        };
        let users = PgUserDirectory::new(pool.clone());
        let CreateUserOutcome::Created(user) = users
            .create_user(&format!("{}@example.com", Uuid::new_v4()), "hash")
            .await?
        else {
            anyhow::bail!("expected user to be created");
        };

        let repo = PgRefreshTokenRepository::new(pool);
        let now = now_unix_seconds();
        let record = RefreshTokenRecord {
            token_hash: Uuid::new_v4().as_bytes().to_vec(),
            user_id: user.id,
            created_at: now,
            updated_at: now,
            expires_at: now + 3600,
            revoked_at: None,
        };
        assert_eq!(repo.insert(&record).await?, InsertOutcome::Inserted);
        assert_eq!(repo.insert(&record).await?, InsertOutcome::Duplicate);

        let found = repo.find_by_token(&record.token_hash).await?;
        assert_eq!(found.as_ref().map(|r| r.expires_at), Some(now + 3600));

        assert_eq!(repo.mark_revoked(&record.token_hash, now + 1).await?, RevokeOutcome::Revoked);
        assert_eq!(
            repo.mark_revoked(&record.token_hash, now + 2).await?,
            RevokeOutcome::AlreadyRevoked
        );
        let found = repo.find_by_token(&record.token_hash).await?;
        assert_eq!(found.and_then(|r| r.revoked_at), Some(now + 1));
        assert_eq!(repo.mark_revoked(&[0; 16], now).await?, RevokeOutcome::NotFound);

        // The audit trail blocks deleting its owner.
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&repo.pool)
            .await;
        assert!(deleted.is_err());
        assert!(repo.find_by_token(&record.token_hash).await?.is_some());
        Ok(())
    }
}
