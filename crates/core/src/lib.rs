//! Collaborators behind the Vaani REST endpoints: the voice catalog, phone
//! registration with OTPs, WhatsApp delivery, and speech synthesis.
//!
//! Nothing in here is used by the realtime relay.

pub mod registration;
pub mod sms;
pub mod speech;
pub mod voices;
