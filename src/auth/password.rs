//! Password hashing with Argon2id.
//!
//! Hashes are stored as PHC strings, so the salt and cost parameters travel
//! with the digest and verification never needs outside configuration.

use argon2::{
    password_hash::{self, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use super::error::AuthError;

// Burned on unknown emails so the login path costs the same either way.
const DUMMY_CREDENTIAL: &str = "chirpy-dummy-credential";

#[derive(Clone)]
pub struct PasswordVault {
    params: Params,
    dummy_hash: String,
}

impl std::fmt::Debug for PasswordVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordVault")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish_non_exhaustive()
    }
}

impl PasswordVault {
    /// Build a vault with explicit Argon2 cost parameters.
    ///
    /// # Errors
    /// Returns `HashingFailure` if the dummy hash cannot be computed.
    pub fn new(params: Params) -> Result<Self, AuthError> {
        let mut vault = Self {
            params,
            dummy_hash: String::new(),
        };
        vault.dummy_hash = vault.hash(DUMMY_CREDENTIAL)?;
        Ok(vault)
    }

    /// Vault using the `argon2` crate defaults (19 MiB, 2 passes), which lands in
    /// the tens of milliseconds per hash on server hardware.
    ///
    /// # Errors
    /// Returns `HashingFailure` if the dummy hash cannot be computed.
    pub fn with_default_cost() -> Result<Self, AuthError> {
        Self::new(Params::default())
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a credential with a fresh random salt.
    ///
    /// # Errors
    /// Returns `HashingFailure` if salt generation or hashing fails.
    pub fn hash(&self, credential: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(credential.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| {
                error!("Failed to hash password: {err}");
                AuthError::HashingFailure
            })
    }

    /// Check a credential against a stored PHC hash.
    ///
    /// The stored hash decides the algorithm and cost, so hashes written with
    /// older parameters keep verifying after the vault is retuned.
    ///
    /// # Errors
    /// Returns `HashingFailure` only if the stored hash cannot be parsed.
    pub fn verify(&self, credential: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|_| {
            error!("Stored password hash is malformed");
            AuthError::HashingFailure
        })?;

        match self.argon2().verify_password(credential.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => {
                error!("Failed to verify password: {err}");
                Err(AuthError::HashingFailure)
            }
        }
    }

    /// Spend one verification on a fixed hash and report a mismatch.
    pub fn verify_absent(&self, credential: &str) -> bool {
        let _ = self.verify(credential, &self.dummy_hash);
        false
    }
}

#[cfg(test)]
pub(crate) fn test_vault() -> PasswordVault {
    // Minimum cost keeps the test suite fast; production uses the defaults.
    let params = Params::new(Params::MIN_M_COST, 1, 1, None).expect("valid argon2 params");
    PasswordVault::new(params).expect("vault")
}
