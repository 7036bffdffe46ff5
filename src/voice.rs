//! Voice identities and the per-conversation voice session lifecycle.
//!
//! A session is an opaque backend handle parameterized by the conversation's
//! system prompt and voice identity at creation time. Its lifecycle is an
//! explicit state machine: `Absent` until first use, `Active` while cached,
//! `Error` after a failed exchange. Every invalidation trigger (prompt
//! change, voice change, backend failure, transport disconnect) funnels
//! through [`VoiceSessionManager::invalidate`].

use crate::backend::{AudioPayload, Backend, ExchangeInput, ExchangeReply, SessionHandle};
use crate::error::{BotError, Result};
use crate::store::ConversationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Closed set of named voices supported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceIdentity {
    #[default]
    Puck,
    Charon,
    Kore,
    Fenrir,
    Aoede,
}

impl VoiceIdentity {
    /// All selectable voices, in `/voz show` listing order.
    pub const ALL: [Self; 5] = [
        Self::Puck,
        Self::Charon,
        Self::Kore,
        Self::Fenrir,
        Self::Aoede,
    ];

    /// Canonical name sent to the backend.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Kore => "Kore",
            Self::Fenrir => "Fenrir",
            Self::Aoede => "Aoede",
        }
    }
}

impl fmt::Display for VoiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceIdentity {
    type Err = ();

    /// Case-insensitive lookup into the closed voice set.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// Lifecycle state of one conversation's voice session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No session; the next voice interaction opens one.
    #[default]
    Absent,
    /// Cached live session.
    Active(SessionHandle),
    /// Last backend call failed; the next interaction retries from scratch.
    Error,
}

/// Per-conversation voice session cache.
#[derive(Default)]
pub struct VoiceSessionManager {
    sessions: HashMap<ConversationId, SessionState>,
}

impl VoiceSessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live session is currently cached for the conversation.
    #[must_use]
    pub fn has_session(&self, id: &ConversationId) -> bool {
        matches!(self.sessions.get(id), Some(SessionState::Active(_)))
    }

    /// Cached handle, or open a new session via the backend and cache it.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend refuses to open a session; nothing
    /// is cached in that case and the state moves to `Error`.
    pub async fn get_or_create(
        &mut self,
        backend: &dyn Backend,
        id: &ConversationId,
        system_prompt: &str,
        identity: VoiceIdentity,
    ) -> Result<SessionHandle> {
        if let Some(SessionState::Active(handle)) = self.sessions.get(id) {
            return Ok(handle.clone());
        }

        match backend.open_voice_session(system_prompt, identity).await {
            Ok(handle) => {
                debug!("opened voice session {} for {id}", handle.id);
                self.sessions
                    .insert(id.clone(), SessionState::Active(handle.clone()));
                Ok(handle)
            }
            Err(err) => {
                self.sessions.insert(id.clone(), SessionState::Error);
                Err(err)
            }
        }
    }

    /// Drop any cached session for the conversation. Idempotent.
    pub fn invalidate(&mut self, id: &ConversationId) {
        if self.sessions.remove(id).is_some() {
            debug!("voice session invalidated for {id}");
        }
    }

    /// Drop all cached sessions (transport disconnect).
    pub fn invalidate_all(&mut self) {
        if !self.sessions.is_empty() {
            debug!("dropping {} voice sessions", self.sessions.len());
            self.sessions.clear();
        }
    }

    /// Text-to-speech pass-through. Returns `None` when the backend produced
    /// no audio or errored; the session is invalidated on error so the next
    /// interaction opens a fresh one.
    pub async fn send_text(
        &mut self,
        backend: &dyn Backend,
        id: &ConversationId,
        system_prompt: &str,
        identity: VoiceIdentity,
        text: &str,
    ) -> Option<AudioPayload> {
        let handle = match self
            .get_or_create(backend, id, system_prompt, identity)
            .await
        {
            Ok(handle) => handle,
            Err(err) => {
                warn!("voice session open failed for {id}: {err}");
                return None;
            }
        };

        match backend
            .exchange(&handle, ExchangeInput::Text(text.to_owned()))
            .await
        {
            Ok(reply) => reply.audio,
            Err(err) => {
                warn!("text-to-speech exchange failed for {id}: {err}");
                self.invalidate(id);
                None
            }
        }
    }

    /// Speech-to-speech pass-through.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be opened or the exchange
    /// fails; the session is invalidated first.
    pub async fn send_audio(
        &mut self,
        backend: &dyn Backend,
        id: &ConversationId,
        system_prompt: &str,
        identity: VoiceIdentity,
        audio: AudioPayload,
    ) -> Result<ExchangeReply> {
        let handle = self
            .get_or_create(backend, id, system_prompt, identity)
            .await?;

        match backend.exchange(&handle, ExchangeInput::Audio(audio)).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                self.invalidate(id);
                Err(BotError::Voice(format!(
                    "audio exchange failed for {id}: {err}"
                )))
            }
        }
    }
}
