//! HS256 access tokens.
//!
//! Layout is the standard compact JWS form: `base64url(header).base64url(claims).base64url(mac)`
//! with no padding. Verification is a pure function of the token, the signing
//! secret and the clock; it never touches storage.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::SystemTime;
use thiserror::Error;
use uuid::Uuid;

use super::error::UnauthenticatedReason;

pub const TOKEN_ISSUER: &str = "chirpy";
const ALG_HS256: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenHeader {
    pub alg: String,
    pub typ: String,
}

impl AccessTokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG_HS256.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid subject")]
    InvalidSubject,
}

impl From<TokenError> for UnauthenticatedReason {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => Self::MalformedToken,
            TokenError::InvalidSignature => Self::InvalidSignature,
            TokenError::Expired => Self::Expired,
            TokenError::InvalidIssuer => Self::InvalidIssuer,
            TokenError::InvalidSubject => Self::InvalidSubject,
        }
    }
}

pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|_| TokenError::Malformed)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

/// Signs and verifies access tokens with one process-wide secret.
pub struct AccessTokenCodec {
    secret: SecretString,
}

impl std::fmt::Debug for AccessTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenCodec").finish_non_exhaustive()
    }
}

impl AccessTokenCodec {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length, so this cannot fail.
        <HmacSha256 as Mac>::new_from_slice(self.secret.expose_secret().as_bytes())
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"))
    }

    /// Issue a token for `subject` valid for `ttl_seconds` from now.
    ///
    /// # Errors
    /// Returns `Malformed` only if the claims cannot be serialized.
    pub fn issue(&self, subject: Uuid, ttl_seconds: i64) -> Result<String, TokenError> {
        self.issue_at(subject, ttl_seconds, now_unix_seconds())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    /// Returns `Malformed` only if the claims cannot be serialized.
    pub fn issue_at(&self, subject: Uuid, ttl_seconds: i64, now: i64) -> Result<String, TokenError> {
        let claims = AccessTokenClaims {
            iss: TOKEN_ISSUER.to_string(),
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_seconds),
        };
        let header_b64 = b64e_json(&AccessTokenHeader::hs256())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token and return its subject.
    ///
    /// # Errors
    /// See [`AccessTokenCodec::verify_at`].
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_at(token, now_unix_seconds())
    }

    /// Verify a token against the clock value `now`.
    ///
    /// The signature is checked before any claim is read, so a forged payload
    /// can only ever produce `Malformed` or `InvalidSignature`.
    ///
    /// # Errors
    /// - `Malformed` if the token is not three base64url JSON segments or is not HS256,
    /// - `InvalidSignature` if the MAC does not match,
    /// - `Expired` if `now >= exp`,
    /// - `InvalidIssuer` if `iss` is not ours,
    /// - `InvalidSubject` if `sub` is not a UUID.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Uuid, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let claims_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let sig_b64 = parts.next().ok_or(TokenError::Malformed)?;
        if parts.next().is_some() {
            return Err(TokenError::Malformed);
        }

        let header: AccessTokenHeader = b64d_json(header_b64)?;
        if header.alg != ALG_HS256 {
            return Err(TokenError::Malformed);
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: AccessTokenClaims = b64d_json(claims_b64)?;
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.iss != TOKEN_ISSUER {
            return Err(TokenError::InvalidIssuer);
        }

        Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidSubject)
    }
}
