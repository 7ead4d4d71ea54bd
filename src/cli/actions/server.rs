use crate::{
    auth::{AuthConfig, PasswordVault, SessionCoordinator},
    chirpy,
    cli::telemetry,
    storage::{
        memory::{MemoryRefreshTokenRepository, MemoryUserDirectory},
        postgres::{self, PgRefreshTokenRepository, PgUserDirectory},
        RefreshTokenRepository, UserDirectory,
    },
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub api_key: Option<SecretString>,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub storage_timeout_seconds: u64,
}

type Backends = (Arc<dyn UserDirectory>, Arc<dyn RefreshTokenRepository>);

/// Execute the server action.
/// # Errors
/// Returns an error if storage cannot be reached or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = AuthConfig::new(args.jwt_secret)
        .with_api_key(args.api_key)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_storage_timeout(Duration::from_secs(args.storage_timeout_seconds));

    let vault =
        PasswordVault::with_default_cost().context("Failed to initialize password hashing")?;

    let (users, refresh_tokens) = backends(&args.dsn).await?;

    let coordinator = Arc::new(SessionCoordinator::new(
        config,
        vault,
        users,
        refresh_tokens,
    ));

    let result = chirpy::new(args.port, coordinator).await;

    telemetry::shutdown_tracer();

    result
}

async fn backends(dsn: &str) -> Result<Backends> {
    let url = Url::parse(dsn).context("Invalid DSN")?;

    match url.scheme() {
        "memory" => {
            warn!("Using in-memory storage, all users and sessions are lost on exit");
            Ok((
                Arc::new(MemoryUserDirectory::new()),
                Arc::new(MemoryRefreshTokenRepository::new()),
            ))
        }
        "postgres" | "postgresql" => {
            let pool = postgres::connect(dsn).await?;
            postgres::apply_schema(&pool).await?;
            info!("Connected to database");
            Ok((
                Arc::new(PgUserDirectory::new(pool.clone())),
                Arc::new(PgRefreshTokenRepository::new(pool)),
            ))
        }
        scheme => Err(anyhow!("Unsupported DSN scheme: {scheme}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_dsn_builds_backends() {
        assert!(backends("memory://").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let result = backends("mysql://localhost/chirpy").await;
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("Unsupported DSN scheme: mysql"));
        }
    }

    #[tokio::test]
    async fn garbage_dsn_is_rejected() {
        assert!(backends("not a url").await.is_err());
    }
}
