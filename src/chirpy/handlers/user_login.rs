use super::{auth_error_response, missing_payload, ErrorBody, UserCredentials};
use crate::auth::SessionCoordinator;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize)]
pub struct UserLogin {
    pub id: Uuid,
    pub email: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub token: String,
    pub refresh_token: String,
}

#[utoipa::path(
    post,
    path= "/api/login",
    request_body = UserCredentials,
    responses (
        (status = 200, description = "Login successful", body = UserLogin, content_type = "application/json"),
        (status = 400, description = "Missing email or password", body = ErrorBody),
        (status = 401, description = "Incorrect email or password", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    coordinator: Extension<Arc<SessionCoordinator>>,
    payload: Option<Json<UserCredentials>>,
) -> impl IntoResponse {
    let Some(Json(credentials)) = payload else {
        return missing_payload().into_response();
    };

    match coordinator
        .login(&credentials.email, &credentials.password)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(UserLogin {
                id: outcome.user.id,
                email: outcome.user.email,
                created_at: outcome.user.created_at,
                updated_at: outcome.user.updated_at,
                token: outcome.tokens.access_token,
                refresh_token: outcome.tokens.refresh_token,
            }),
        )
            .into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}
