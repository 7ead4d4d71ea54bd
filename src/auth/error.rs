//! Error taxonomy for the auth core.
//!
//! Every variant carries a stable machine-readable code. The HTTP status is
//! chosen by the caller (see `chirpy::handlers`), never here.

use thiserror::Error;

/// Why a request could not be authenticated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnauthenticatedReason {
    HeaderMissing,
    HeaderEmpty,
    MalformedScheme,
    MalformedToken,
    InvalidSignature,
    Expired,
    InvalidIssuer,
    InvalidSubject,
    UnknownUser,
    RefreshTokenNotFound,
    RefreshTokenUnusable,
    InvalidApiKey,
    ApiKeyDisabled,
}

impl UnauthenticatedReason {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::HeaderMissing => "header_missing",
            Self::HeaderEmpty => "header_empty",
            Self::MalformedScheme => "malformed_scheme",
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::InvalidIssuer => "invalid_issuer",
            Self::InvalidSubject => "invalid_subject",
            Self::UnknownUser => "unknown_user",
            Self::RefreshTokenNotFound => "refresh_token_not_found",
            Self::RefreshTokenUnusable => "refresh_token_unusable",
            Self::InvalidApiKey => "invalid_api_key",
            Self::ApiKeyDisabled => "api_key_disabled",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::HeaderMissing => "no authorization header found",
            Self::HeaderEmpty => "authorization header is empty",
            Self::MalformedScheme => "authorization header uses an unexpected scheme",
            Self::MalformedToken => "token is malformed",
            Self::InvalidSignature => "token signature is invalid",
            Self::Expired => "token has expired",
            Self::InvalidIssuer => "token issuer is invalid",
            Self::InvalidSubject => "token subject is invalid",
            Self::UnknownUser => "token subject no longer exists",
            Self::RefreshTokenNotFound => "refresh token not found",
            Self::RefreshTokenUnusable => "refresh token is expired or revoked",
            Self::InvalidApiKey => "api key is invalid",
            Self::ApiKeyDisabled => "api key authentication is disabled",
        }
    }
}

impl std::fmt::Display for UnauthenticatedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("user already exists")]
    Conflict,
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("unauthenticated: {0}")]
    Unauthenticated(UnauthenticatedReason),
    #[error("password hashing failed")]
    HashingFailure,
    #[error("entropy source failure")]
    EntropyFailure,
    #[error("storage failure")]
    StorageFailure(#[source] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict => "conflict",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::HashingFailure => "hashing_failure",
            Self::EntropyFailure => "entropy_failure",
            Self::StorageFailure(_) => "storage_failure",
        }
    }

    /// The inner reason when this is an `Unauthenticated` error.
    #[must_use]
    pub const fn reason(&self) -> Option<UnauthenticatedReason> {
        match self {
            Self::Unauthenticated(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<UnauthenticatedReason> for AuthError {
    fn from(reason: UnauthenticatedReason) -> Self {
        Self::Unauthenticated(reason)
    }
}
