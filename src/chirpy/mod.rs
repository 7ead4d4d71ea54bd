#![allow(clippy::needless_for_each)]

use crate::{
    auth::{Principal, SessionCoordinator},
    chirpy::handlers::{
        health, health::__path_health, token_refresh, token_refresh::__path_refresh,
        token_revoke::__path_revoke, user_login, user_login::__path_login, user_register,
        user_register::__path_register, user_update, user_update::__path_update,
        whoami::__path_whoami,
    },
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;

#[derive(OpenApi)]
#[openapi(
    paths(health, register, update, login, refresh, revoke, whoami),
    components(schemas(
        health::Health,
        handlers::UserCredentials,
        handlers::ErrorBody,
        user_register::UserCreated,
        user_update::UserUpdated,
        user_login::UserLogin,
        token_refresh::AccessToken,
        Principal
    )),
    tags(
        (name = "chirpy", description = "Users, logins and session tokens")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router around a shared coordinator.
pub fn router(coordinator: Arc<SessionCoordinator>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_origin(Any);

    Router::new()
        .route("/api/users", post(handlers::register).put(handlers::update))
        .route("/api/login", post(handlers::login))
        .route("/api/refresh", post(handlers::refresh))
        .route("/api/revoke", post(handlers::revoke))
        .route("/api/whoami", get(handlers::whoami))
        .route("/health", get(handlers::health).options(handlers::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(coordinator)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, coordinator: Arc<SessionCoordinator>) -> Result<()> {
    let app = router(coordinator);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
