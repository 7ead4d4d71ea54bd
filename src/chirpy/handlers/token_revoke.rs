use super::{auth_error_response, ErrorBody};
use crate::auth::SessionCoordinator;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

#[utoipa::path(
    post,
    path= "/api/revoke",
    params(
        ("Authorization" = String, Header, description = "Bearer <refresh token>")
    ),
    responses (
        (status = 204, description = "Refresh token revoked"),
        (status = 401, description = "Missing or malformed Authorization header", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn revoke(
    headers: HeaderMap,
    coordinator: Extension<Arc<SessionCoordinator>>,
) -> impl IntoResponse {
    match coordinator.revoke(&headers).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}
