//! Vaani API Library Crate
//!
//! Everything behind the `api` binary: configuration, shared state, the
//! Postgres user store, REST handlers, routing, and the realtime relay that
//! bridges client WebSockets to Gemini Live sessions.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
