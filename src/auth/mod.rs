//! Authentication core: password hashing, access tokens, refresh tokens,
//! credential extraction and the session flows built from them.
//!
//! Handlers should only talk to [`SessionCoordinator`]; the other components
//! are public so they can be exercised and composed on their own.

pub mod credentials;
pub mod error;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod refresh_token;
pub mod session;
pub mod state;

pub use credentials::{extract_api_key, extract_bearer};
pub use error::{AuthError, UnauthenticatedReason};
pub use jwt::{AccessTokenClaims, AccessTokenCodec, TokenError, TOKEN_ISSUER};
pub use password::PasswordVault;
pub use principal::Principal;
pub use refresh_token::RefreshTokenStore;
pub use session::{LoginOutcome, SessionCoordinator, TokenPair};
pub use state::AuthConfig;
