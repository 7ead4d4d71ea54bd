//! # Chirpy (authentication and session core)
//!
//! `chirpy` issues and verifies the credentials used by the Chirpy API.
//!
//! ## Tokens
//!
//! - **Access tokens** are compact HS256 JWTs. They are stateless: any instance
//!   sharing the signing secret can verify them without a database round-trip,
//!   which is why they are short-lived and never individually revocable.
//! - **Refresh tokens** are opaque 256-bit random strings stored server-side.
//!   They are revocable, never deleted, and are reused (not rotated) until they
//!   expire or are revoked.
//!
//! ## Passwords
//!
//! Passwords are hashed with Argon2id and verified in constant time. Login never
//! reveals whether the email or the password was wrong.
//!
//! > **Warning:** Rotating the signing secret invalidates every outstanding
//! > access token. Refresh tokens are unaffected.

pub mod auth;
pub mod chirpy;
pub mod cli;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
