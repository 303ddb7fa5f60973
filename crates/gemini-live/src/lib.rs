//! Client for the Gemini Live bidirectional streaming API.
//!
//! [`GeminiLiveClient`] wraps one WebSocket connection: it performs the
//! setup handshake, encodes outbound audio, image and text messages, and hands
//! inbound frames back undecoded so callers can pick out the parts they need
//! with the types in [`types`].

mod client;
mod error;
pub mod types;

pub use client::{
    DEFAULT_ENDPOINT, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MODEL, GeminiLiveClient,
    LiveSettings,
};
pub use error::LiveError;
pub use types::SessionConfig;
