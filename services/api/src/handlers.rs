//! Axum Handlers for the REST API
//!
//! Registration, OTP verification, text-to-speech, and a small window onto
//! the live relay sessions. `utoipa` doc comments feed the OpenAPI document.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};
use vaani_core::voices::{Gender, neural_voice};

use crate::{
    models::{
        ErrorResponse, RegisterParams, SessionInfo, StatusResponse, TtsParams, TtsResponse,
        VerifyParams,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn parse_gender(raw: &str) -> Result<Gender, ApiError> {
    raw.parse::<Gender>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Register a phone number and send it a one-time password over WhatsApp.
#[utoipa::path(
    post,
    path = "/register",
    params(RegisterParams),
    responses(
        (status = 200, description = "OTP generated and sent", body = StatusResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RegisterParams>,
) -> Result<Json<StatusResponse>, ApiError> {
    let gender = parse_gender(&params.gender)?;
    state
        .registration
        .register(&params.name, &params.no, gender)
        .await?;
    Ok(Json(StatusResponse::from_outcome(true)))
}

/// Check a one-time password and mark the phone number verified on a match.
#[utoipa::path(
    post,
    path = "/verify",
    params(VerifyParams),
    responses(
        (status = 200, description = "`success` on a match, `failure` otherwise", body = StatusResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<StatusResponse>, ApiError> {
    let verified = state.registration.verify(&params.no, params.otp).await?;
    Ok(Json(StatusResponse::from_outcome(verified)))
}

/// Render text to a `.wav` file with the neural voice for a language and gender.
#[utoipa::path(
    post,
    path = "/tts",
    params(TtsParams),
    responses(
        (status = 200, description = "Audio rendered", body = TtsResponse),
        (status = 400, description = "Unsupported language or gender", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn tts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TtsParams>,
) -> Result<Json<TtsResponse>, ApiError> {
    let gender = parse_gender(&params.gender)?;
    let voice = neural_voice(&params.language, gender).ok_or_else(|| {
        ApiError::BadRequest(format!("Unsupported language '{}'", params.language))
    })?;

    let path = state.speech.synthesize(&params.text, voice).await?;
    Ok(Json(TtsResponse {
        filename: path.display().to_string(),
    }))
}

/// Look up a live relay session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = SessionInfo),
        (status = 404, description = "No live session with this id", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Client id the session connected with")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    let handle = state
        .sessions
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))?;
    Ok(Json(SessionInfo {
        id: handle.id().to_string(),
        state: handle.state(),
    }))
}

/// Ask a live relay session to shut down.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    responses(
        (status = 202, description = "Close requested"),
        (status = 404, description = "No live session with this id", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Client id the session connected with")
    )
)]
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let handle = state
        .sessions
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))?;
    handle.close();
    info!(session_id = %id, "Close requested over REST.");
    Ok(StatusCode::ACCEPTED)
}
