//! Auth configuration injected at construction.

use secrecy::SecretString;
use std::time::Duration;

pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 60 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 60 * 24 * 60 * 60;
/// Longest TTL the CLI accepts: ten years.
pub const MAX_TOKEN_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
pub const DEFAULT_STORAGE_TIMEOUT_SECONDS: u64 = 5;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_secret: SecretString,
    api_key: Option<SecretString>,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    storage_timeout: Duration,
}

impl AuthConfig {
    /// Every instance sharing a token namespace must use the same secret.
    #[must_use]
    pub fn new(signing_secret: SecretString) -> Self {
        Self {
            signing_secret,
            api_key: None,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            storage_timeout: Duration::from_secs(DEFAULT_STORAGE_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    pub(crate) fn signing_secret(&self) -> &SecretString {
        &self.signing_secret
    }

    pub(crate) fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn storage_timeout(&self) -> Duration {
        self.storage_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_and_builders() {
        let config = AuthConfig::new(SecretString::from("secret".to_string()));
        assert_eq!(config.access_token_ttl_seconds(), 3600);
        assert_eq!(config.refresh_token_ttl_seconds(), 5_184_000);
        assert_eq!(config.storage_timeout(), Duration::from_secs(5));
        assert!(config.api_key().is_none());

        let config = config
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(120)
            .with_storage_timeout(Duration::from_millis(250))
            .with_api_key(Some(SecretString::from("key".to_string())));
        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.refresh_token_ttl_seconds(), 120);
        assert_eq!(config.storage_timeout(), Duration::from_millis(250));
        assert_eq!(config.api_key().map(|key| key.expose_secret()), Some("key"));
        assert_eq!(config.signing_secret().expose_secret(), "secret");
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AuthConfig::new(SecretString::from("hunter2".to_string()));
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
