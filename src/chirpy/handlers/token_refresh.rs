use super::{auth_error_response, ErrorBody};
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

#[derive(ToSchema, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
}

#[utoipa::path(
    post,
    path= "/api/refresh",
    params(
        ("Authorization" = String, Header, description = "Bearer <refresh token>")
    ),
    responses (
        (status = 200, description = "New access token", body = AccessToken, content_type = "application/json"),
        (status = 401, description = "Missing, unknown, expired or revoked refresh token", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(
    headers: HeaderMap,
    coordinator: Extension<Arc<SessionCoordinator>>,
) -> impl IntoResponse {
    match coordinator.refresh(&headers).await {
        Ok(token) => (StatusCode::OK, Json(AccessToken { token })).into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}
