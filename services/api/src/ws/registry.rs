//! Live relay sessions, keyed by the id the client connected with.

use dashmap::{DashMap, mapref::entry::Entry};
use gemini_live::GeminiLiveClient;
use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;
use utoipa::ToSchema;

/// Lifecycle of one relay session. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingConfig,
    Handshaking,
    Active,
    Closing,
    Closed,
}

/// Everything the registry knows about a live session.
pub struct SessionHandle {
    id: String,
    upstream: Arc<GeminiLiveClient>,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
    released: AtomicBool,
}

impl SessionHandle {
    pub fn new(id: impl Into<String>, upstream: Arc<GeminiLiveClient>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::AwaitingConfig);
        Arc::new(Self {
            id: id.into(),
            upstream,
            state,
            cancel: CancellationToken::new(),
            released: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn upstream(&self) -> &Arc<GeminiLiveClient> {
        &self.upstream
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Advances the lifecycle. Attempts to move backwards are ignored.
    pub(crate) fn advance(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    /// Asks the relay loop driving this session to shut it down.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("session '{0}' is already live")]
    Duplicate(String),
}

/// Concurrent map of live sessions. Clones share the same map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, handle: Arc<SessionHandle>) -> Result<(), RegistryError> {
        match self.sessions.entry(handle.id().to_string()) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate(handle.id().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Removes the entry if present. Missing ids are not an error.
    pub fn remove(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.remove(id).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Joint teardown of a session's upstream side and registry entry.
    ///
    /// Only the first call for a handle does anything and returns `true`;
    /// every later or concurrent call returns `false` straight away. The
    /// entry is removed only while it still points at this handle.
    pub async fn release(&self, handle: &Arc<SessionHandle>) -> bool {
        if handle.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        handle.advance(SessionState::Closing);
        handle.cancel.cancel();
        handle.upstream.close().await;
        self.sessions
            .remove_if(handle.id(), |_, current| Arc::ptr_eq(current, handle));
        debug!(session_id = %handle.id(), live_sessions = self.len(), "Session released.");
        true
    }
}
