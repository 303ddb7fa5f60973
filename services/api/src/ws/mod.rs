//! Realtime relay sessions over WebSockets.
//!
//! - `protocol`: the JSON envelopes exchanged with the client, and how Gemini
//!   responses map onto them.
//! - `registry`: the live session table and the shared teardown primitive.
//! - `session`: the per-connection relay loop, from handshake to teardown.

pub mod protocol;
pub mod registry;
pub mod session;

pub use registry::{SessionHandle, SessionRegistry, SessionState};
pub use session::ws_handler;
