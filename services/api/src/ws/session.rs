//! Manages the WebSocket connection lifecycle for one relay session.

use super::{
    protocol::{ClientMessage, EnvelopeError, ServerMessage, forward_upstream},
    registry::{SessionHandle, SessionState},
};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use gemini_live::{GeminiLiveClient, LiveError, SessionConfig, types::ServerMessage as UpstreamMessage};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

type ClientSink = SplitSink<WebSocket, Message>;
type ClientStream = SplitStream<WebSocket>;

/// Reasons a session never reached the active state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("client disconnected before sending config")]
    ClientGone,
    #[error(transparent)]
    Upstream(#[from] LiveError),
}

/// Why a session stopped.
#[derive(Debug)]
enum SessionEnd {
    ClientClosed,
    UpstreamClosed,
    UpstreamFailed(LiveError),
    ClientWriteFailed,
    CloseRequested,
    IdleTimeout,
}

/// Axum handler to upgrade an HTTP connection to a relay session.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

/// Drives one client connection from handshake to teardown.
///
/// The session is registered before anything is read so it can be found and
/// closed from outside. Whatever ends it (either pump, a close request, or
/// the idle timer) the same teardown runs: the upstream is closed, the entry
/// is dropped from the registry, and the client socket is closed last.
#[instrument(name = "ws_session", skip_all, fields(session_id = %client_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, client_id: String) {
    let (mut socket_tx, mut socket_rx) = socket.split();

    let upstream = Arc::new(GeminiLiveClient::new(state.live.clone()));
    let handle = SessionHandle::new(client_id, upstream);
    if let Err(e) = state.sessions.put(handle.clone()) {
        warn!(error = %e, "Rejecting connection.");
        let _ = send_msg(&mut socket_tx, ServerMessage::Error(e.to_string())).await;
        let _ = socket_tx.close().await;
        return;
    }
    info!(
        live_sessions = state.sessions.len(),
        "Client connected. Awaiting config..."
    );

    let activity = Activity::new();
    let outcome = tokio::select! {
        outcome = run_session(&handle, &mut socket_tx, &mut socket_rx, &activity) => outcome,
        _ = handle.cancelled() => Ok(SessionEnd::CloseRequested),
        _ = activity.idle(state.idle_timeout) => Ok(SessionEnd::IdleTimeout),
    };

    match outcome {
        Ok(SessionEnd::UpstreamFailed(e)) => error!(error = %e, "Upstream failed."),
        Ok(end) => info!(reason = ?end, "Session ended."),
        Err(SessionError::ClientGone) => info!("Client disconnected before sending config."),
        Err(e) => {
            warn!(error = %e, "Session could not start.");
            let _ = send_msg(&mut socket_tx, ServerMessage::Error(e.to_string())).await;
        }
    }

    state.sessions.release(&handle).await;
    let _ = socket_tx.close().await;
    handle.advance(SessionState::Closed);
    info!(live_sessions = state.sessions.len(), "Session closed.");
}

/// Handshake, then both pumps until the first one finishes.
async fn run_session(
    handle: &SessionHandle,
    socket_tx: &mut ClientSink,
    socket_rx: &mut ClientStream,
    activity: &Activity,
) -> Result<SessionEnd, SessionError> {
    let config = await_config(socket_rx).await?;
    activity.touch();

    let upstream = handle.upstream();
    upstream.configure(config);
    handle.advance(SessionState::Handshaking);
    let ack = upstream.open().await?;
    debug!(%ack, "Upstream setup acknowledged.");
    handle.advance(SessionState::Active);
    info!("Session active.");

    // Dropping the losing pump cancels its pending read.
    let end = tokio::select! {
        end = client_to_upstream(socket_rx, upstream, activity) => end,
        end = upstream_to_client(upstream, socket_tx, activity) => end,
    };
    Ok(end)
}

/// Reads the first client message, which must be `config`.
async fn await_config(socket_rx: &mut ClientStream) -> Result<SessionConfig, SessionError> {
    let text = loop {
        match socket_rx.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Binary(_))) => {
                return Err(SessionError::ProtocolViolation(
                    "first message must be `config`, got a binary frame".to_string(),
                ));
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                return Err(SessionError::ClientGone);
            }
        }
    };

    match ClientMessage::parse(text.as_str()) {
        Ok(ClientMessage::Config { config }) if config.voice.trim().is_empty() => Err(
            SessionError::ProtocolViolation("`config.voice` must name a voice".to_string()),
        ),
        Ok(ClientMessage::Config { config }) => Ok(config),
        Ok(other) => Err(SessionError::ProtocolViolation(format!(
            "first message must be `config`, got `{}`",
            other.kind()
        ))),
        Err(e) => Err(SessionError::ProtocolViolation(format!(
            "first message must be `config`: {}",
            e
        ))),
    }
}

/// Client -> Gemini. Ends when the client goes away or a send fails.
async fn client_to_upstream(
    socket_rx: &mut ClientStream,
    upstream: &GeminiLiveClient,
    activity: &Activity,
) -> SessionEnd {
    while let Some(frame) = socket_rx.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                debug!(?frame, "Client sent close frame.");
                return SessionEnd::ClientClosed;
            }
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary frame from client.");
                continue;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                debug!(error = %e, "Client socket failed.");
                return SessionEnd::ClientClosed;
            }
        };
        activity.touch();

        let sent = match ClientMessage::parse(text.as_str()) {
            Ok(ClientMessage::Audio { data }) => upstream.send_audio(&data).await,
            Ok(ClientMessage::Image { data }) => upstream.send_image(&data).await,
            Ok(ClientMessage::Text { data }) => upstream.send_text(&data).await,
            Ok(ClientMessage::Config { .. }) => {
                warn!("Ignoring repeated config message.");
                continue;
            }
            Err(EnvelopeError::UnknownType(kind)) => {
                warn!(%kind, "Ignoring unknown message type.");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed client message.");
                continue;
            }
        };
        if let Err(e) = sent {
            return if e.is_closed() {
                SessionEnd::UpstreamClosed
            } else {
                SessionEnd::UpstreamFailed(e)
            };
        }
    }
    SessionEnd::ClientClosed
}

/// Gemini -> client. Ends when the upstream closes or the client write fails.
async fn upstream_to_client(
    upstream: &GeminiLiveClient,
    socket_tx: &mut ClientSink,
    activity: &Activity,
) -> SessionEnd {
    loop {
        let raw = match upstream.receive().await {
            Ok(raw) => raw,
            Err(e) if e.is_closed() => return SessionEnd::UpstreamClosed,
            Err(e) => return SessionEnd::UpstreamFailed(e),
        };
        activity.touch();

        let message = match serde_json::from_str::<UpstreamMessage>(&raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable upstream message.");
                continue;
            }
        };
        for outbound in forward_upstream(message) {
            if let Err(e) = send_msg(socket_tx, outbound).await {
                debug!(error = %e, "Failed to write to client.");
                return SessionEnd::ClientWriteFailed;
            }
        }
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(socket_tx: &mut ClientSink, msg: ServerMessage) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}

/// Last time either side of the session produced traffic.
struct Activity {
    started: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last_ms.store(elapsed, Ordering::Relaxed);
    }

    /// Resolves once `timeout` passes without a [`touch`](Self::touch).
    /// Never resolves when `timeout` is `None`.
    async fn idle(&self, timeout: Option<Duration>) {
        let Some(timeout) = timeout else {
            return std::future::pending().await;
        };
        loop {
            let last = Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
            let deadline = self.started + last + timeout;
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}
