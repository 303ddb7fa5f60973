//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like service clients and the live session table.

use crate::ws::SessionRegistry;
use gemini_live::LiveSettings;
use std::{sync::Arc, time::Duration};
use vaani_core::{registration::RegistrationService, speech::SpeechSynthesizer};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registration: Arc<RegistrationService>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// Settings every new upstream client is built from.
    pub live: Arc<LiveSettings>,
    pub sessions: SessionRegistry,
    /// `None` disables the idle timeout.
    pub idle_timeout: Option<Duration>,
}
