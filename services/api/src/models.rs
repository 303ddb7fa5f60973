//! API Models
//!
//! Query parameters and JSON bodies of the REST endpoints, with `utoipa`
//! schemas for the OpenAPI document.

use crate::ws::SessionState;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct RegisterParams {
    #[param(example = "Asha")]
    pub name: String,
    /// Ten-digit phone number without the country code.
    #[param(example = "9876543210")]
    pub no: String,
    #[param(example = "female")]
    pub gender: String,
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct VerifyParams {
    #[param(example = "9876543210")]
    pub no: String,
    #[param(example = 123456)]
    pub otp: u32,
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct TtsParams {
    #[param(example = "namaste")]
    pub text: String,
    #[param(example = "hindi")]
    pub language: String,
    #[param(example = "male")]
    pub gender: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: Status,
}

impl StatusResponse {
    pub fn from_outcome(ok: bool) -> Self {
        let status = if ok { Status::Success } else { Status::Failure };
        Self { status }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct TtsResponse {
    /// Path of the rendered `.wav` file on the server.
    #[schema(example = "/tmp/vaani-tts/5f0c8f8e-2b1e-4c55-9a57-1d2b1f7c3c11.wav")]
    pub filename: String,
}

/// A live relay session as seen from outside.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub state: SessionState,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
