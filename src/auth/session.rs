//! Session flows: register, login, authenticate, refresh and revoke.
//!
//! Flow Overview:
//! - Login verifies the password, then issues an access token and registers a
//!   fresh refresh token.
//! - Protected requests present the access token; it is verified statelessly.
//! - Refresh presents the refresh token; a usable record yields a new access
//!   token. The refresh token itself is not rotated.
//! - Revoke presents the refresh token and stamps it revoked.
//!
//! Security boundaries: login answers `InvalidCredentials` for both unknown
//! emails and wrong passwords, and spends the same Argon2 work on each.

use regex::Regex;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, instrument};

use super::credentials::{extract_api_key, extract_bearer};
use super::error::{AuthError, UnauthenticatedReason};
use super::jwt::{now_unix_seconds, AccessTokenCodec};
use super::password::PasswordVault;
use super::principal::Principal;
use super::refresh_token::{bounded, RefreshTokenStore};
use super::state::AuthConfig;
use crate::storage::{
    CreateUserOutcome, RefreshTokenRepository, UpdateUserOutcome, UserDirectory, UserRecord,
};
use axum::http::HeaderMap;

const MINT_ATTEMPTS: usize = 3;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

// Digests first so the comparison always runs over 32 bytes.
fn constant_time_eq(left: &str, right: &str) -> bool {
    let left = Sha256::digest(left.as_bytes());
    let right = Sha256::digest(right.as_bytes());
    left.as_slice().ct_eq(right.as_slice()).into()
}

/// Tokens handed out by a successful login.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct LoginOutcome {
    pub user: UserRecord,
    pub tokens: TokenPair,
}

pub struct SessionCoordinator {
    config: AuthConfig,
    vault: PasswordVault,
    codec: AccessTokenCodec,
    refresh_tokens: RefreshTokenStore,
    users: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("config", &self.config)
            .field("vault", &self.vault)
            .field("refresh_tokens", &self.refresh_tokens)
            .finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        vault: PasswordVault,
        users: Arc<dyn UserDirectory>,
        refresh_repository: Arc<dyn RefreshTokenRepository>,
    ) -> Self {
        let codec = AccessTokenCodec::new(config.signing_secret().clone());
        let refresh_tokens = RefreshTokenStore::new(refresh_repository, config.storage_timeout());
        Self {
            config,
            vault,
            codec,
            refresh_tokens,
            users,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let vault = self.vault.clone();
        tokio::task::spawn_blocking(move || vault.hash(&password))
            .await
            .map_err(|err| {
                error!("Password hashing task failed: {err}");
                AuthError::HashingFailure
            })?
    }

    // `None` means the email was unknown; the dummy hash keeps timing flat.
    async fn verify_password(&self, password: String, hash: Option<String>) -> Result<bool, AuthError> {
        let vault = self.vault.clone();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => vault.verify(&password, &hash),
            None => Ok(vault.verify_absent(&password)),
        })
        .await
        .map_err(|err| {
            error!("Password verification task failed: {err}");
            AuthError::HashingFailure
        })?
    }

    // Signing is an HMAC step; a failure here is internal, never a 401.
    fn issue_access_token(&self, principal: Principal) -> Result<String, AuthError> {
        self.codec
            .issue(principal.user_id, self.config.access_token_ttl_seconds())
            .map_err(|err| {
                error!("Failed to issue access token: {err}");
                AuthError::HashingFailure
            })
    }

    /// Create a user with a hashed password.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed email or empty password, `Conflict` if the
    /// email is taken, `HashingFailure`/`StorageFailure` from collaborators.
    #[instrument(skip_all)]
    pub async fn register(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidInput("invalid email".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".to_string()));
        }

        let password_hash = self.hash_password(password.to_string()).await?;
        let outcome = bounded(
            self.config.storage_timeout(),
            self.users.create_user(&email, &password_hash),
        )
        .await?;

        match outcome {
            CreateUserOutcome::Created(user) => {
                info!(user_id = %user.id, "User registered");
                Ok(user)
            }
            CreateUserOutcome::Conflict => {
                debug!("Registration conflict");
                Err(AuthError::Conflict)
            }
        }
    }

    /// Verify credentials and hand out an access token plus a refresh token.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed email or empty password,
    /// `InvalidCredentials` for unknown emails and wrong passwords alike, and
    /// collaborator failures otherwise.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        let user = bounded(self.config.storage_timeout(), self.users.find_by_email(&email)).await?;
        let hash = user.as_ref().map(|user| user.password_hash.clone());
        let matched = self.verify_password(password.to_string(), hash).await?;

        let Some(user) = user.filter(|_| matched) else {
            debug!("Login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let principal = Principal::new(user.id);
        let access_token = self.issue_access_token(principal)?;
        let refresh_token = self.issue_refresh_token(principal).await?;

        info!(user_id = %user.id, "Login successful");

        Ok(LoginOutcome {
            user,
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }

    async fn issue_refresh_token(&self, principal: Principal) -> Result<String, AuthError> {
        // A duplicate insert leaves the existing record untouched; mint again.
        for _ in 0..MINT_ATTEMPTS {
            let raw = RefreshTokenStore::mint()?;
            if self
                .refresh_tokens
                .register(
                    &raw,
                    principal.user_id,
                    self.config.refresh_token_ttl_seconds(),
                )
                .await?
            {
                return Ok(raw);
            }
        }

        error!("Failed to generate a unique refresh token");
        Err(AuthError::EntropyFailure)
    }

    /// Resolve the bearer access token on a request into a principal.
    ///
    /// # Errors
    /// `Unauthenticated` with the extractor or codec reason.
    #[instrument(skip_all)]
    pub fn authenticate_request(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = extract_bearer(headers)?;
        let user_id = self.codec.verify(&token).map_err(|err| {
            let reason = UnauthenticatedReason::from(err);
            debug!(reason = reason.code(), "Access token rejected");
            AuthError::Unauthenticated(reason)
        })?;
        Ok(Principal::new(user_id))
    }

    /// Replace the email and password of the user named by the bearer access token.
    ///
    /// # Errors
    /// `Unauthenticated` for a bad access token or a subject that no longer
    /// exists, `InvalidInput` for a malformed email or empty password,
    /// `Conflict` if another user holds the email, collaborator failures otherwise.
    #[instrument(skip_all)]
    pub async fn update_credentials(
        &self,
        headers: &HeaderMap,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        let principal = self.authenticate_request(headers)?;

        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidInput("invalid email".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".to_string()));
        }

        let password_hash = self.hash_password(password.to_string()).await?;
        let outcome = bounded(
            self.config.storage_timeout(),
            self.users
                .update_user(principal.user_id, &email, &password_hash),
        )
        .await?;

        match outcome {
            UpdateUserOutcome::Updated(user) => {
                info!(user_id = %user.id, "User credentials updated");
                Ok(user)
            }
            UpdateUserOutcome::Conflict => {
                debug!(user_id = %principal.user_id, "Email update conflict");
                Err(AuthError::Conflict)
            }
            UpdateUserOutcome::NotFound => {
                debug!(user_id = %principal.user_id, "Access token names an unknown user");
                Err(AuthError::Unauthenticated(UnauthenticatedReason::UnknownUser))
            }
        }
    }

    /// Issue a new access token from the bearer refresh token.
    ///
    /// # Errors
    /// `Unauthenticated` when the header is bad or the refresh token is unknown,
    /// expired or revoked; `StorageFailure` from the store.
    #[instrument(skip_all)]
    pub async fn refresh(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let raw = extract_bearer(headers)?;
        let record = self.refresh_tokens.resolve(&raw).await?;

        if !record.is_usable(now_unix_seconds()) {
            debug!(user_id = %record.user_id, "Refresh token expired or revoked");
            return Err(AuthError::Unauthenticated(
                UnauthenticatedReason::RefreshTokenUnusable,
            ));
        }

        self.issue_access_token(Principal::new(record.user_id))
    }

    /// Revoke the bearer refresh token.
    ///
    /// Unknown and already-revoked tokens succeed too, so the answer never
    /// reveals whether a token existed.
    ///
    /// # Errors
    /// `Unauthenticated` only when the header is missing or malformed;
    /// `StorageFailure` from the store.
    #[instrument(skip_all)]
    pub async fn revoke(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let raw = extract_bearer(headers)?;
        match self.refresh_tokens.revoke(&raw).await {
            Ok(outcome) => {
                debug!(?outcome, "Refresh token revoked");
                Ok(())
            }
            Err(AuthError::Unauthenticated(UnauthenticatedReason::RefreshTokenNotFound)) => {
                debug!("Revoke requested for unknown refresh token");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Check `Authorization: ApiKey <key>` against the configured key.
    ///
    /// # Errors
    /// `Unauthenticated(ApiKeyDisabled)` when no key is configured,
    /// `Unauthenticated(InvalidApiKey)` on mismatch, extractor reasons otherwise.
    #[instrument(skip_all)]
    pub fn authenticate_api_key(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let Some(expected) = self.config.api_key() else {
            return Err(AuthError::Unauthenticated(
                UnauthenticatedReason::ApiKeyDisabled,
            ));
        };
        let presented = extract_api_key(headers)?;
        if constant_time_eq(&presented, expected.expose_secret()) {
            Ok(())
        } else {
            debug!("API key rejected");
            Err(AuthError::Unauthenticated(
                UnauthenticatedReason::InvalidApiKey,
            ))
        }
    }
}
