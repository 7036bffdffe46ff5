//! Inbound event routing.
//!
//! One engine task consumes the event queue and fully processes each event,
//! including backend round-trips, before the next one starts. The store is
//! shared behind a mutex only so the dashboard and the eviction sweep can
//! take snapshots; conversation semantics are mutated exclusively here.

use crate::backend::Backend;
use crate::command::{self, CommandOutcome};
use crate::config::BotConfig;
use crate::error::Result;
use crate::store::{ConversationId, Store};
use crate::transport::{ConnectionEvent, InboundEvent, OutboundContent, Transport};
use crate::voice::VoiceSessionManager;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Reply sent when a voice message arrives in an inactive chat.
const ACTIVATION_PROMPT: &str = "The bot is not active in this chat. Send /bot to activate it.";

/// Event consumed by the engine loop.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Inbound chat message.
    Inbound(InboundEvent),
    /// Transport connection lifecycle signal.
    Connection(ConnectionEvent),
}

/// Per-conversation state machine and dispatcher.
pub struct Engine {
    pub(crate) config: BotConfig,
    pub(crate) store: Arc<Mutex<Store>>,
    pub(crate) sessions: VoiceSessionManager,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) transport: Arc<dyn Transport>,
}

impl Engine {
    #[must_use]
    pub fn new(
        config: BotConfig,
        backend: Arc<dyn Backend>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let store = Store::new(
            config.chat.system_prompt.clone(),
            config.voice.default_identity,
        );
        Self {
            config,
            store: Arc::new(Mutex::new(store)),
            sessions: VoiceSessionManager::new(),
            backend,
            transport,
        }
    }

    /// Shared store handle for the dashboard and the eviction sweep.
    #[must_use]
    pub fn store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }

    /// Whether a live voice session is cached for the conversation.
    #[must_use]
    pub fn has_voice_session(&self, id: &ConversationId) -> bool {
        self.sessions.has_session(id)
    }

    /// Consume the event queue until it closes.
    pub async fn run(mut self, mut rx: mpsc::Receiver<EngineEvent>) {
        info!("engine loop started");
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::Inbound(event) => self.handle_event(event).await,
                EngineEvent::Connection(event) => self.handle_connection(event),
            }
        }
        info!("engine loop stopped");
    }

    /// Process one inbound event. Errors are contained here so one bad event
    /// cannot stop the loop.
    pub async fn handle_event(&mut self, event: InboundEvent) {
        let event_id = event.id.clone();
        if let Err(err) = self.process_event(event).await {
            error!("event {event_id} failed: {err}");
        }
    }

    async fn process_event(&mut self, event: InboundEvent) -> Result<()> {
        // The bot never responds to its own echoes or in group chats.
        if event.is_self || event.is_group {
            debug!("event {} ignored (self or group)", event.id);
            return Ok(());
        }

        if let Some(audio) = event.audio {
            let active = self.with_store(|store| store.get_or_create(&event.from).active);
            if !active {
                self.deliver(&event.from, ACTIVATION_PROMPT.to_owned(), None)
                    .await;
                return Ok(());
            }
            return self.respond_audio(&event.from, audio).await;
        }

        let body = event.body.trim().to_owned();
        if body.is_empty() {
            debug!("event {} ignored (empty body)", event.id);
            return Ok(());
        }

        let session_live = self.sessions.has_session(&event.from);
        let outcome = self.with_store(|store| {
            command::interpret(&body, store, &event.from, session_live)
        });

        match outcome {
            CommandOutcome::Handled {
                reply,
                invalidate_session,
            } => {
                if invalidate_session {
                    self.sessions.invalidate(&event.from);
                }
                self.deliver(&event.from, reply, None).await;
                Ok(())
            }
            CommandOutcome::NoMatch => {
                let active = self.with_store(|store| store.get_or_create(&event.from).active);
                if active {
                    self.respond_text(&event.from, &body).await
                } else {
                    // Inactive chats drop ordinary messages silently.
                    debug!("event {} dropped (chat inactive)", event.id);
                    Ok(())
                }
            }
        }
    }

    /// Apply a transport connection signal. Only stats change; on disconnect
    /// every cached voice session is discarded.
    pub fn handle_connection(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Qr(payload) => {
                info!("pairing QR issued");
                self.with_store(|store| {
                    store.stats.last_qr = Some(payload);
                    store.stats.connection_status = "pairing".to_owned();
                });
            }
            ConnectionEvent::Ready => {
                info!("transport ready");
                self.with_store(|store| {
                    store.stats.connection_status = "ready".to_owned();
                });
            }
            ConnectionEvent::Authenticated => {
                info!("transport authenticated");
                self.with_store(|store| {
                    store.stats.is_authenticated = true;
                    store.stats.connection_status = "authenticated".to_owned();
                });
            }
            ConnectionEvent::AuthFailure(reason) => {
                error!("transport authentication failed: {reason}");
                self.with_store(|store| {
                    store.stats.is_authenticated = false;
                    store.stats.connection_status = "auth_failure".to_owned();
                });
            }
            ConnectionEvent::Disconnected(reason) => {
                warn!("transport disconnected: {reason}");
                self.sessions.invalidate_all();
                self.with_store(|store| {
                    store.stats.is_authenticated = false;
                    store.stats.connection_status = "disconnected".to_owned();
                });
            }
        }
    }

    /// Run a closure against the locked store. The lock is never held across
    /// an await point.
    pub(crate) fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        let mut store = match self.store.lock() {
            Ok(store) => store,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut store)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::test_support::{RecordingTransport, StubBackend, inbound};
    use crate::transport::OutboundContent;

    fn engine(backend: StubBackend) -> (Engine, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let engine = Engine::new(
            BotConfig::default(),
            Arc::new(backend),
            Arc::clone(&transport) as Arc<dyn Transport>,
        );
        (engine, transport)
    }

    #[tokio::test]
    async fn group_message_is_a_complete_no_op() {
        let (mut engine, transport) = engine(StubBackend::with_text("never"));
        let mut event = inbound("group-chat", "/bot");
        event.is_group = true;

        engine.handle_event(event).await;

        assert!(transport.sent().is_empty());
        engine.with_store(|store| {
            assert_eq!(store.stats.total_messages, 0);
            assert!(store.get(&ConversationId::from("group-chat")).is_none());
        });
    }

    #[tokio::test]
    async fn self_echo_is_ignored() {
        let (mut engine, transport) = engine(StubBackend::with_text("never"));
        let mut event = inbound("chat", "hello");
        event.is_self = true;

        engine.handle_event(event).await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn empty_body_is_dropped() {
        let (mut engine, transport) = engine(StubBackend::with_text("never"));
        engine.handle_event(inbound("chat", "   ")).await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn command_short_circuits_generation_even_when_active() {
        let (mut engine, transport) = engine(StubBackend::with_text("never"));
        let id = ConversationId::from("chat");

        engine.handle_event(inbound("chat", "/bot")).await;
        engine.with_store(|store| assert!(store.get(&id).unwrap().active));

        // Exact command match never reaches the generator.
        engine.handle_event(inbound("chat", "/bot")).await;
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        engine.with_store(|store| assert_eq!(store.stats.total_messages, 0));
    }

    #[tokio::test]
    async fn inactive_chat_drops_ordinary_messages_silently() {
        let (mut engine, transport) = engine(StubBackend::with_text("never"));
        engine.handle_event(inbound("chat", "hello")).await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn activation_then_message_generates_two_turns() {
        let (mut engine, transport) = engine(StubBackend::with_text("hi there"));
        let id = ConversationId::from("chat");

        engine.handle_event(inbound("chat", "/bot")).await;
        engine.handle_event(inbound("chat", "hello")).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[1], OutboundContent::Text(text) if text == "hi there"));

        engine.with_store(|store| {
            let state = store.get(&id).unwrap();
            assert_eq!(state.transcript.len(), 2);
            assert_eq!(state.transcript[0].text, "hello");
            assert_eq!(state.transcript[1].text, "hi there");
            assert_eq!(store.stats.total_messages, 1);
        });
    }

    #[tokio::test]
    async fn near_miss_command_reaches_generator_when_active() {
        let (mut engine, transport) = engine(StubBackend::with_text("generated"));
        engine.handle_event(inbound("chat", "/bot")).await;
        engine.handle_event(inbound("chat", "/botter")).await;

        let sent = transport.sent();
        assert!(matches!(&sent[1], OutboundContent::Text(text) if text == "generated"));
    }

    #[tokio::test]
    async fn audio_in_inactive_chat_gets_activation_prompt() {
        let (mut engine, transport) = engine(StubBackend::with_text("never"));
        let mut event = inbound("chat", "");
        event.audio = Some(crate::backend::AudioPayload {
            data: vec![1, 2, 3],
            mime: "audio/ogg".to_owned(),
        });

        engine.handle_event(event).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], OutboundContent::Text(text) if text == ACTIVATION_PROMPT));
    }

    #[tokio::test]
    async fn disconnect_clears_voice_sessions() {
        let (mut engine, _transport) = engine(StubBackend::with_text("spoken").with_audio());
        let id = ConversationId::from("chat");

        engine.handle_event(inbound("chat", "/bot")).await;
        engine.handle_event(inbound("chat", "/voz")).await;
        engine.handle_event(inbound("chat", "hello")).await;
        assert!(engine.has_voice_session(&id));

        engine.handle_connection(ConnectionEvent::Disconnected("gone".to_owned()));
        assert!(!engine.has_voice_session(&id));
        engine.with_store(|store| {
            assert_eq!(store.stats.connection_status, "disconnected");
        });
    }

    #[tokio::test]
    async fn voice_change_invalidates_cached_session() {
        let (mut engine, _transport) = engine(StubBackend::with_text("spoken").with_audio());
        let id = ConversationId::from("chat");

        engine.handle_event(inbound("chat", "/bot")).await;
        engine.handle_event(inbound("chat", "/voz")).await;
        engine.handle_event(inbound("chat", "hello")).await;
        assert!(engine.has_voice_session(&id));

        engine.handle_event(inbound("chat", "/voz aoede")).await;
        assert!(!engine.has_voice_session(&id));
    }
}
