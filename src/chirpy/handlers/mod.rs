pub mod health;
pub use self::health::health;

pub mod user_register;
pub use self::user_register::register;

pub mod user_update;
pub use self::user_update::update;

pub mod user_login;
pub use self::user_login::login;

pub mod token_refresh;
pub use self::token_refresh::refresh;

pub mod token_revoke;
pub use self::token_revoke::revoke;

pub mod whoami;
pub use self::whoami::whoami;

// common types and helpers for the handlers
use crate::auth::AuthError;
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Email and password as posted by clients.
#[derive(ToSchema, Deserialize)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// JSON body for every error response.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    pub error: String,
}

/// Map an auth error to its HTTP status. The core never picks status codes.
pub(crate) fn auth_error_response(err: &AuthError) -> (StatusCode, Json<ErrorBody>) {
    let status = match err {
        AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AuthError::Conflict => StatusCode::CONFLICT,
        AuthError::InvalidCredentials | AuthError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        AuthError::HashingFailure | AuthError::EntropyFailure | AuthError::StorageFailure(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorBody {
            code: err.code().to_string(),
            error: err.to_string(),
        }),
    )
}

pub(crate) fn missing_payload() -> (StatusCode, Json<ErrorBody>) {
    auth_error_response(&AuthError::InvalidInput("missing payload".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UnauthenticatedReason;

    #[test]
    fn auth_error_response_maps_status() {
        let cases = [
            (AuthError::InvalidInput("x".to_string()), StatusCode::BAD_REQUEST),
            (AuthError::Conflict, StatusCode::CONFLICT),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (
                AuthError::Unauthenticated(UnauthenticatedReason::Expired),
                StatusCode::UNAUTHORIZED,
            ),
            (AuthError::HashingFailure, StatusCode::INTERNAL_SERVER_ERROR),
            (AuthError::EntropyFailure, StatusCode::INTERNAL_SERVER_ERROR),
            (
                AuthError::StorageFailure(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let (status, Json(body)) = auth_error_response(&err);
            assert_eq!(status, expected);
            assert_eq!(body.code, err.code());
        }
    }

    #[test]
    fn storage_failure_does_not_leak_source() {
        let err = AuthError::StorageFailure(anyhow::anyhow!("password=hunter2 host=db"));
        let (_, Json(body)) = auth_error_response(&err);
        assert!(!body.error.contains("hunter2"));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = UserCredentials {
            email: "a@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
