use super::{auth_error_response, missing_payload, ErrorBody, UserCredentials};
use crate::auth::SessionCoordinator;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserUpdated {
    pub id: Uuid,
    pub email: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[utoipa::path(
    put,
    path= "/api/users",
    params(
        ("Authorization" = String, Header, description = "Bearer <access token>")
    ),
    request_body = UserCredentials,
    responses (
        (status = 200, description = "Email and password updated", body = UserUpdated, content_type = "application/json"),
        (status = 400, description = "Invalid email or empty password", body = ErrorBody),
        (status = 401, description = "Missing, malformed, expired or forged access token", body = ErrorBody),
        (status = 409, description = "Email already taken by another user", body = ErrorBody),
    ),
    tag= "users"
)]
#[instrument(skip_all)]
pub async fn update(
    headers: HeaderMap,
    coordinator: Extension<Arc<SessionCoordinator>>,
    payload: Option<Json<UserCredentials>>,
) -> impl IntoResponse {
    let Some(Json(credentials)) = payload else {
        // Unauthenticated callers get 401 before any payload error.
        if let Err(err) = coordinator.authenticate_request(&headers) {
            return auth_error_response(&err).into_response();
        }
        return missing_payload().into_response();
    };

    match coordinator
        .update_credentials(&headers, &credentials.email, &credentials.password)
        .await
    {
        Ok(user) => (
            StatusCode::OK,
            Json(UserUpdated {
                id: user.id,
                email: user.email,
                created_at: user.created_at,
                updated_at: user.updated_at,
            }),
        )
            .into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}
