//! A single Gemini Live connection, owned by one relay session.

use crate::{
    error::LiveError,
    types::{AUDIO_MIME_TYPE, ClientMessage, IMAGE_MIME_TYPE, ServerMessage, SessionConfig},
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use secrecy::{ExposeSecret, SecretString};
use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Deployment-level settings shared by every session.
#[derive(Debug)]
pub struct LiveSettings {
    pub endpoint: String,
    pub api_key: SecretString,
    pub model: String,
    /// Persona sent as the system instruction of every session.
    pub system_instruction: String,
    /// Upper bound for connecting and for waiting on `setupComplete`.
    pub handshake_timeout: Duration,
}

impl LiveSettings {
    pub fn new(api_key: SecretString, system_instruction: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            system_instruction: system_instruction.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    fn url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}key={}",
            self.endpoint,
            separator,
            self.api_key.expose_secret()
        )
    }
}

/// Owns exactly one upstream connection for the lifetime of a relay session.
///
/// All methods take `&self` so the two relay pumps can share the client: one
/// side sends while the other waits in [`receive`](Self::receive). The write
/// and read halves sit behind separate locks, and a cancellation token lets
/// [`close`](Self::close) wake a pending read instead of waiting for the peer.
pub struct GeminiLiveClient {
    settings: Arc<LiveSettings>,
    config: OnceLock<SessionConfig>,
    sink: Mutex<Option<WsSink>>,
    source: Mutex<Option<WsSource>>,
    shutdown: CancellationToken,
    /// Set while an `open` is in flight or has succeeded.
    opening: AtomicBool,
    closed: AtomicBool,
}

impl GeminiLiveClient {
    pub fn new(settings: Arc<LiveSettings>) -> Self {
        Self {
            settings,
            config: OnceLock::new(),
            sink: Mutex::new(None),
            source: Mutex::new(None),
            shutdown: CancellationToken::new(),
            opening: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Stores the session options. The first configuration wins.
    pub fn configure(&self, config: SessionConfig) {
        if self.config.set(config).is_err() {
            warn!("Upstream session is already configured; ignoring new configuration.");
        }
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.get()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Connects, sends the setup message, and waits for `setupComplete`.
    ///
    /// Returns the raw acknowledgment frame. Nothing touches the network if
    /// [`configure`](Self::configure) was never called. Only one `open` may be
    /// in flight; a failed attempt can be retried.
    pub async fn open(&self) -> Result<String, LiveError> {
        let config = self.config.get().ok_or(LiveError::ConfigurationMissing)?;
        if self.shutdown.is_cancelled() {
            return Err(LiveError::NotConnected);
        }
        if self.opening.swap(true, Ordering::AcqRel) {
            return Err(LiveError::AlreadyConnected);
        }

        let result = self.connect_and_setup(config).await;
        if result.is_err() {
            self.opening.store(false, Ordering::Release);
        }
        result
    }

    async fn connect_and_setup(&self, config: &SessionConfig) -> Result<String, LiveError> {
        let voice = config.voice.as_str();
        let timeout = self.settings.handshake_timeout;

        let ws_stream = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(LiveError::NotConnected),
            result = tokio::time::timeout(timeout, connect_async(self.settings.url())) => match result {
                Ok(Ok((ws_stream, _))) => ws_stream,
                Ok(Err(e)) => return Err(LiveError::UpstreamConnect(e.to_string())),
                Err(_) => return Err(LiveError::UpstreamConnect(format!("timed out after {:?}", timeout))),
            },
        };
        info!(model = %self.settings.model, %voice, "Connected to Gemini Live.");

        let (mut sink, mut source) = ws_stream.split();
        let setup = ClientMessage::setup(
            &self.settings.model,
            voice,
            &self.settings.system_instruction,
        );
        sink.send(Message::text(serde_json::to_string(&setup)?))
            .await
            .map_err(|e| LiveError::UpstreamSetup(e.to_string()))?;

        let ack = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(LiveError::NotConnected),
            result = tokio::time::timeout(timeout, wait_for_setup(&mut source)) => match result {
                Ok(ack) => ack?,
                Err(_) => return Err(LiveError::UpstreamSetup(format!("no setupComplete within {:?}", timeout))),
            },
        };

        // Lock order is sink then source, the same as `close`.
        let mut sink_slot = self.sink.lock().await;
        if self.shutdown.is_cancelled() {
            let _ = sink.close().await;
            return Err(LiveError::NotConnected);
        }
        *self.source.lock().await = Some(source);
        *sink_slot = Some(sink);
        debug!("Gemini Live setup acknowledged.");
        Ok(ack)
    }

    pub async fn send_audio(&self, data: &str) -> Result<(), LiveError> {
        self.send(&ClientMessage::media(AUDIO_MIME_TYPE, data)).await
    }

    pub async fn send_image(&self, data: &str) -> Result<(), LiveError> {
        self.send(&ClientMessage::media(IMAGE_MIME_TYPE, data)).await
    }

    pub async fn send_text(&self, text: &str) -> Result<(), LiveError> {
        self.send(&ClientMessage::user_text(text)).await
    }

    async fn send(&self, message: &ClientMessage) -> Result<(), LiveError> {
        let payload = serde_json::to_string(message)?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(LiveError::NotConnected)?;
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(LiveError::NotConnected),
            result = sink.send(Message::text(payload)) => match result {
                Ok(()) => Ok(()),
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    Err(LiveError::UpstreamClosed)
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Waits for the next data frame from Gemini and returns it undecoded.
    ///
    /// Ends with [`LiveError::UpstreamClosed`] once the peer closes, the
    /// transport fails, or [`close`](Self::close) is called.
    pub async fn receive(&self) -> Result<String, LiveError> {
        let mut guard = self.source.lock().await;
        let Some(source) = guard.as_mut() else {
            return Err(if self.shutdown.is_cancelled() {
                LiveError::UpstreamClosed
            } else {
                LiveError::NotConnected
            });
        };

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(LiveError::UpstreamClosed),
                frame = source.next() => frame,
            };
            match frame {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                // Gemini delivers its JSON in binary frames.
                Some(Ok(Message::Binary(data))) => {
                    return Ok(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "Gemini Live closed the connection.");
                    return Err(LiveError::UpstreamClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(error = %e, "Gemini Live transport error.");
                    return Err(LiveError::UpstreamClosed);
                }
                None => return Err(LiveError::UpstreamClosed),
            }
        }
    }

    /// Closes the connection. Idempotent and infallible.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();

        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
                Ok(Ok(())) => debug!("Closed Gemini Live connection."),
                Ok(Err(e)) => debug!(error = %e, "Gemini Live connection was already gone."),
                Err(_) => warn!("Timed out sending close frame to Gemini Live."),
            }
        }
        self.source.lock().await.take();
    }
}

async fn wait_for_setup(source: &mut WsSource) -> Result<String, LiveError> {
    while let Some(frame) = source.next().await {
        let raw = match frame {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
            Ok(Message::Close(frame)) => {
                return Err(LiveError::UpstreamSetup(format!(
                    "connection closed before setup completed: {:?}",
                    frame
                )));
            }
            Ok(_) => continue,
            Err(e) => return Err(LiveError::UpstreamSetup(e.to_string())),
        };
        match serde_json::from_str::<ServerMessage>(&raw) {
            Ok(message) if message.setup_complete.is_some() => return Ok(raw),
            _ => warn!(%raw, "Ignoring unexpected message while waiting for setupComplete."),
        }
    }
    Err(LiveError::UpstreamSetup(
        "connection ended before setup completed".to_string(),
    ))
}
