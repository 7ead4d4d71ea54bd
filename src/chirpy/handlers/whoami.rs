use super::{auth_error_response, ErrorBody};
use crate::auth::{Principal, SessionCoordinator};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

#[utoipa::path(
    get,
    path= "/api/whoami",
    params(
        ("Authorization" = String, Header, description = "Bearer <access token>")
    ),
    responses (
        (status = 200, description = "Authenticated principal", body = Principal, content_type = "application/json"),
        (status = 401, description = "Missing, malformed, expired or forged access token", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn whoami(
    headers: HeaderMap,
    coordinator: Extension<Arc<SessionCoordinator>>,
) -> impl IntoResponse {
    match coordinator.authenticate_request(&headers) {
        Ok(principal) => (StatusCode::OK, Json(principal)).into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}
