//! Coro: WhatsApp-connected generative-AI chat bot core.
//!
//! The core is a per-chat conversation state machine and command dispatcher:
//! for every inbound event it decides what persisted state to read, how to
//! mutate it, what backend call (if any) to issue, and what to send back.
//!
//! # Architecture
//!
//! One engine task consumes a queue of inbound events and fully processes
//! each one before the next:
//! - **Store**: in-memory per-conversation state (prompt, transcript, voice
//!   preferences) plus global counters
//! - **Command interpreter**: `/bot`, `/voz`, `/prompt` administrative
//!   grammar, short-circuiting generation
//! - **Response generator**: prompt assembly, backend invocation, text or
//!   voice reply selection
//! - **Voice session manager**: lazy per-chat backend sessions with
//!   consolidated invalidation
//! - **Dashboard**: read-only `axum` status endpoints plus the inbound
//!   webhook edge

pub mod backend;
pub mod command;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod generate;
pub mod router;
pub mod store;
pub mod transcript;
pub mod transport;
pub mod voice;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::BotConfig;
pub use error::{BotError, Result};
pub use router::{Engine, EngineEvent};
pub use store::{ConversationId, Store};
