//! In-memory collaborators and a fake Gemini endpoint shared by the
//! integration tests.
#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use gemini_live::LiveSettings;
use secrecy::SecretString;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use vaani_api::{state::AppState, ws::SessionRegistry};
use vaani_core::{
    registration::{OtpSender, PendingUser, RegistrationService, UserStore},
    speech::SpeechSynthesizer,
};

#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<HashMap<String, PendingUser>>,
    pub verified: Mutex<HashSet<String>>,
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_pending(&self, user: &PendingUser) -> Result<()> {
        self.users
            .lock()
            .unwrap()
            .insert(user.phone.clone(), user.clone());
        self.verified.lock().unwrap().remove(&user.phone);
        Ok(())
    }

    async fn find_otp(&self, phone: &str) -> Result<Option<u32>> {
        Ok(self.users.lock().unwrap().get(phone).map(|user| user.otp))
    }

    async fn mark_verified(&self, phone: &str) -> Result<()> {
        self.verified.lock().unwrap().insert(phone.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, u32)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl OtpSender for RecordingSender {
    async fn send_otp(&self, phone: &str, otp: u32) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("twilio unavailable");
        }
        self.sent.lock().unwrap().push((phone.to_string(), otp));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    pub requests: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<PathBuf> {
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), voice.to_string()));
        Ok(PathBuf::from(format!("/tmp/vaani-tts/{}.wav", voice)))
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub sender: Arc<RecordingSender>,
    pub speech: Arc<FakeSpeech>,
}

pub fn test_app(gemini_endpoint: &str, idle_timeout: Option<Duration>) -> TestApp {
    let store = Arc::new(MemoryStore::default());
    let sender = Arc::new(RecordingSender::default());
    let speech = Arc::new(FakeSpeech::default());
    let live = LiveSettings::new(
        SecretString::from("test-key".to_string()),
        "Repeat everything in Hindi.",
    )
    .with_endpoint(gemini_endpoint)
    .with_handshake_timeout(Duration::from_secs(2));

    let state = Arc::new(AppState {
        registration: Arc::new(RegistrationService::new(store.clone(), sender.clone())),
        speech: speech.clone(),
        live: Arc::new(live),
        sessions: SessionRegistry::new(),
        idle_timeout,
    });
    TestApp {
        state,
        store,
        sender,
        speech,
    }
}

/// A Gemini Live stand-in that acknowledges setup on its first connection.
pub struct FakeGemini {
    pub endpoint: String,
    /// Connections accepted so far.
    pub connections: Arc<AtomicUsize>,
    /// Every JSON frame the relay sent upstream, setup first. Ends once the
    /// upstream connection is gone.
    pub received: mpsc::UnboundedReceiver<Value>,
    /// `Some(value)` pushes a frame to the relay, `None` closes the socket.
    pub outbound: mpsc::UnboundedSender<Option<Value>>,
}

pub async fn spawn_gemini() -> FakeGemini {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/live", listener.local_addr().unwrap());
    let connections = Arc::new(AtomicUsize::new(0));
    let (received_tx, received) = mpsc::unbounded_channel();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Option<Value>>();

    let counter = connections.clone();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        counter.fetch_add(1, Ordering::SeqCst);
        let mut ws = accept_async(stream).await.unwrap();

        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let _ = received_tx.send(serde_json::from_str(text.as_str()).unwrap());
            }
            _ => return,
        }
        if ws
            .send(Message::text(r#"{"setupComplete":{}}"#))
            .await
            .is_err()
        {
            return;
        }

        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = received_tx.send(serde_json::from_str(text.as_str()).unwrap());
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                outbound = outbound_rx.recv() => match outbound {
                    Some(Some(value)) => {
                        if ws.send(Message::text(value.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(None) | None => {
                        let _ = ws.close(None).await;
                        break;
                    }
                },
            }
        }
    });

    FakeGemini {
        endpoint,
        connections,
        received,
        outbound,
    }
}
