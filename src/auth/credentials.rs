//! Credential extraction from the `Authorization` header.
//!
//! Only the first `Authorization` field is consulted. Later duplicates are
//! ignored, never merged.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::error::UnauthenticatedReason;

const BEARER_PREFIX: &str = "Bearer ";
const API_KEY_PREFIX: &str = "ApiKey ";

fn extract_with_prefix(headers: &HeaderMap, prefix: &str) -> Result<String, UnauthenticatedReason> {
    let value = headers
        .get_all(AUTHORIZATION)
        .iter()
        .next()
        .ok_or(UnauthenticatedReason::HeaderMissing)?;

    if value.is_empty() {
        return Err(UnauthenticatedReason::HeaderEmpty);
    }

    let value = value
        .to_str()
        .map_err(|_| UnauthenticatedReason::MalformedScheme)?;

    let credential = value
        .strip_prefix(prefix)
        .ok_or(UnauthenticatedReason::MalformedScheme)?
        .trim();

    if credential.is_empty() {
        return Err(UnauthenticatedReason::HeaderEmpty);
    }

    Ok(credential.to_string())
}

/// Extract the credential from `Authorization: Bearer <token>`.
///
/// # Errors
/// `HeaderMissing` when there is no `Authorization` header, `HeaderEmpty` when
/// it (or the credential after the prefix) is blank, `MalformedScheme` when the
/// case-sensitive `Bearer ` prefix is absent.
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, UnauthenticatedReason> {
    extract_with_prefix(headers, BEARER_PREFIX)
}

/// Extract the credential from `Authorization: ApiKey <key>`.
///
/// # Errors
/// Same contract as [`extract_bearer`] with the `ApiKey ` prefix.
pub fn extract_api_key(headers: &HeaderMap) -> Result<String, UnauthenticatedReason> {
    extract_with_prefix(headers, API_KEY_PREFIX)
}
