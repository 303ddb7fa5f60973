use tokio_tungstenite::tungstenite;

/// Errors surfaced by [`crate::GeminiLiveClient`].
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("session configuration must be set before connecting")]
    ConfigurationMissing,
    #[error("failed to connect to Gemini Live: {0}")]
    UpstreamConnect(String),
    #[error("Gemini Live setup was not acknowledged: {0}")]
    UpstreamSetup(String),
    #[error("the upstream connection is already open")]
    AlreadyConnected,
    #[error("the upstream connection is not open")]
    NotConnected,
    #[error("the upstream connection was closed")]
    UpstreamClosed,
    #[error("failed to encode upstream message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("upstream transport error: {0}")]
    Transport(#[from] tungstenite::Error),
}

impl LiveError {
    /// True for the errors that mean "the conversation is over" rather than
    /// something went wrong.
    pub fn is_closed(&self) -> bool {
        matches!(self, LiveError::UpstreamClosed | LiveError::NotConnected)
    }
}
