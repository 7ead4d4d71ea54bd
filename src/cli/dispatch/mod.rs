//! Map parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    ARG_ACCESS_TOKEN_TTL, ARG_API_KEY, ARG_DSN, ARG_JWT_SECRET, ARG_PORT, ARG_REFRESH_TOKEN_TTL,
    ARG_STORAGE_TIMEOUT,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let jwt_secret = matches
        .get_one::<String>(ARG_JWT_SECRET)
        .filter(|secret| !secret.trim().is_empty())
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --jwt-secret")?;

    let api_key = matches
        .get_one::<String>(ARG_API_KEY)
        .filter(|key| !key.trim().is_empty())
        .cloned()
        .map(SecretString::from);

    let access_token_ttl_seconds = matches
        .get_one::<i64>(ARG_ACCESS_TOKEN_TTL)
        .copied()
        .ok_or_else(|| anyhow!("missing required argument: --access-token-ttl"))?;
    let refresh_token_ttl_seconds = matches
        .get_one::<i64>(ARG_REFRESH_TOKEN_TTL)
        .copied()
        .ok_or_else(|| anyhow!("missing required argument: --refresh-token-ttl"))?;
    let storage_timeout_seconds = matches
        .get_one::<u64>(ARG_STORAGE_TIMEOUT)
        .copied()
        .ok_or_else(|| anyhow!("missing required argument: --storage-timeout"))?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret,
        api_key,
        access_token_ttl_seconds,
        refresh_token_ttl_seconds,
        storage_timeout_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn env_vars(
        secret: Option<&'static str>,
        api_key: Option<&'static str>,
    ) -> [(&'static str, Option<&'static str>); 7] {
        [
            ("CHIRPY_DSN", Some("memory://")),
            ("CHIRPY_JWT_SECRET", secret),
            ("CHIRPY_API_KEY", api_key),
            ("CHIRPY_PORT", None),
            ("CHIRPY_ACCESS_TOKEN_TTL", None),
            ("CHIRPY_REFRESH_TOKEN_TTL", None),
            ("CHIRPY_STORAGE_TIMEOUT", None),
        ]
    }

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(env_vars(Some("s3cret"), Some("polka")), || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["chirpy"]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(Action::Server(args)) = result {
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "memory://");
                assert_eq!(args.jwt_secret.expose_secret(), "s3cret");
                assert_eq!(
                    args.api_key.as_ref().map(|key| key.expose_secret()),
                    Some("polka")
                );
                assert_eq!(args.access_token_ttl_seconds, 3600);
                assert_eq!(args.refresh_token_ttl_seconds, 5_184_000);
                assert_eq!(args.storage_timeout_seconds, 5);
                assert!(!format!("{args:?}").contains("s3cret"));
            }
        });
    }

    #[test]
    fn blank_secret_is_rejected() {
        temp_env::with_vars(env_vars(Some("   "), None), || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["chirpy"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err
                    .to_string()
                    .contains("missing required argument: --jwt-secret"));
            }
        });
    }

    #[test]
    fn blank_api_key_disables_api_key_auth() {
        temp_env::with_vars(env_vars(Some("s3cret"), Some("")), || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["chirpy"]);
            if let Ok(Action::Server(args)) = handler(&matches) {
                assert!(args.api_key.is_none());
            } else {
                panic!("expected a server action");
            }
        });
    }
}
