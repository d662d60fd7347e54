//! Veil Assistant
//!
//! The chat panel's model: a transcript and the service that answers it.
//! Backends are an HTTP JSON endpoint or a scripted offline responder.

pub mod service;
pub mod session;

pub use service::{service_from_config, AssistantService, HttpAssistant, ScriptedAssistant};
pub use session::{AssistantSession, ChatTurn, Role};
