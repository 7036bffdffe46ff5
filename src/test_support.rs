//! Shared stub collaborators for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::backend::{
    AudioPayload, Backend, ExchangeInput, ExchangeReply, SessionHandle,
};
use crate::error::{BotError, Result};
use crate::store::ConversationId;
use crate::transport::{InboundEvent, OutboundContent, Transport};
use crate::voice::VoiceIdentity;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Scriptable backend stub.
#[derive(Default)]
pub struct StubBackend {
    text: String,
    fail_generate: bool,
    fail_sessions: bool,
    produce_audio: bool,
    sessions_opened: AtomicUsize,
}

impl StubBackend {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Self::default()
        }
    }

    /// Backend whose `generate_text` always fails.
    pub fn failing() -> Self {
        Self {
            fail_generate: true,
            ..Self::default()
        }
    }

    /// Exchanges return an audio payload alongside text.
    #[must_use]
    pub fn with_audio(mut self) -> Self {
        self.produce_audio = true;
        self
    }

    /// Voice session opens always fail.
    #[must_use]
    pub fn with_failing_sessions(mut self) -> Self {
        self.fail_sessions = true;
        self
    }

    /// Number of voice sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn generate_text(&self, _prompt: &str) -> Result<String> {
        if self.fail_generate {
            return Err(BotError::Backend("stubbed generation failure".to_owned()));
        }
        Ok(self.text.clone())
    }

    async fn open_voice_session(
        &self,
        _system_prompt: &str,
        _identity: VoiceIdentity,
    ) -> Result<SessionHandle> {
        if self.fail_sessions {
            return Err(BotError::Voice("stubbed session failure".to_owned()));
        }
        let n = self.sessions_opened.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(SessionHandle {
            id: format!("session-{n}"),
        })
    }

    async fn exchange(
        &self,
        _session: &SessionHandle,
        _input: ExchangeInput,
    ) -> Result<ExchangeReply> {
        Ok(ExchangeReply {
            text: Some(self.text.clone()),
            audio: self.produce_audio.then(|| AudioPayload {
                data: vec![0xAA, 0xBB],
                mime: "audio/ogg".to_owned(),
            }),
        })
    }
}

/// Transport stub that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundContent>>,
    fail_audio: AtomicBool,
}

impl RecordingTransport {
    /// Everything delivered so far, in order.
    pub fn sent(&self) -> Vec<OutboundContent> {
        self.sent.lock().unwrap().clone()
    }

    /// Make audio deliveries fail from now on (text still succeeds).
    pub fn fail_audio_sends(&self) {
        self.fail_audio.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn reply(&self, _to: &ConversationId, content: OutboundContent) -> Result<()> {
        if self.fail_audio.load(Ordering::Relaxed)
            && matches!(content, OutboundContent::Audio(_))
        {
            return Err(BotError::Transport("stubbed audio send failure".to_owned()));
        }
        self.sent.lock().unwrap().push(content);
        Ok(())
    }
}

/// Plain direct-chat inbound event.
pub fn inbound(from: &str, body: &str) -> InboundEvent {
    InboundEvent {
        id: uuid::Uuid::new_v4().to_string(),
        from: ConversationId::from(from),
        body: body.to_owned(),
        is_group: false,
        is_self: false,
        audio: None,
    }
}
