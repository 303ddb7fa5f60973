//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{ErrorResponse, SessionInfo, Status, StatusResponse, TtsResponse},
    state::AppState,
    ws::{SessionState, ws_handler},
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register,
        handlers::verify,
        handlers::tts,
        handlers::get_session,
        handlers::close_session,
    ),
    components(
        schemas(StatusResponse, Status, TtsResponse, SessionInfo, SessionState, ErrorResponse)
    ),
    tags(
        (name = "Vaani API", description = "Registration, speech synthesis and realtime relay sessions")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/register", post(handlers::register))
        .route("/verify", post(handlers::verify))
        .route("/tts", post(handlers::tts))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::close_session),
        )
        .route("/ws/{client_id}", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
