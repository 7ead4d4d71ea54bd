use super::{auth_error_response, missing_payload, ErrorBody, UserCredentials};
use crate::auth::SessionCoordinator;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserCreated {
    pub id: Uuid,
    pub email: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[utoipa::path(
    post,
    path= "/api/users",
    request_body = UserCredentials,
    responses (
        (status = 201, description = "User created", body = UserCreated, content_type = "application/json"),
        (status = 400, description = "Invalid email or empty password", body = ErrorBody),
        (status = 409, description = "User with the specified email already exists", body = ErrorBody),
    ),
    tag= "users"
)]
#[instrument(skip_all)]
pub async fn register(
    coordinator: Extension<Arc<SessionCoordinator>>,
    payload: Option<Json<UserCredentials>>,
) -> impl IntoResponse {
    let Some(Json(credentials)) = payload else {
        return missing_payload().into_response();
    };

    match coordinator
        .register(&credentials.email, &credentials.password)
        .await
    {
        Ok(user) => (
            StatusCode::CREATED,
            Json(UserCreated {
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
