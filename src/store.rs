//! In-memory per-conversation state and global counters.
//!
//! All state is process-local; a restart loses every conversation. The two
//! maps (conversation state and voice preferences) share the same key but
//! have independent lifecycles. Aggregate counters are maintained
//! incrementally at the mutation site rather than by rescanning the maps.

use crate::transcript::Turn;
use crate::voice::VoiceIdentity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Characters of the system prompt shown in dashboard previews.
const PROMPT_PREVIEW_CHARS: usize = 50;

/// Opaque key identifying one chat thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConversationId(String);

impl ConversationId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Per-conversation chat state.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Whether ordinary (non-command) messages invoke the generator.
    pub active: bool,
    /// Instruction prefix sent with every generation call.
    pub system_prompt: String,
    /// Append-only message log. Never trimmed in storage.
    pub transcript: Vec<Turn>,
    /// Last time this conversation was touched; drives idle eviction.
    pub last_activity: DateTime<Utc>,
}

impl ConversationState {
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            active: false,
            system_prompt: system_prompt.into(),
            transcript: Vec::new(),
            last_activity: Utc::now(),
        }
    }
}

/// Per-conversation voice preferences.
#[derive(Debug, Clone)]
pub struct VoiceState {
    /// User wants voice replies at all.
    pub voice_enabled: bool,
    /// Voice used for synthesized replies.
    pub voice_identity: VoiceIdentity,
    /// Reply in voice without an explicit per-message request. Currently
    /// co-set with `voice_enabled` by every command; kept separate so the
    /// two can diverge later.
    pub auto_voice: bool,
}

impl VoiceState {
    #[must_use]
    pub fn new(voice_identity: VoiceIdentity) -> Self {
        Self {
            voice_enabled: false,
            voice_identity,
            auto_voice: false,
        }
    }

    /// Whether replies should be synthesized for this conversation.
    #[must_use]
    pub fn wants_voice(&self) -> bool {
        self.voice_enabled || self.auto_voice
    }
}

/// Observational counters and connection status. Never drives decisions.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    /// Messages answered on the success path (text and voice).
    pub total_messages: u64,
    /// Conversations ever created.
    pub total_chats: u64,
    /// Conversations currently active.
    pub active_chats: u64,
    /// Conversations with voice replies enabled.
    pub voice_chats: u64,
    /// Inbound voice messages answered on the success path.
    pub audio_messages: u64,
    /// Transport connection status string.
    pub connection_status: String,
    /// Whether the transport reported successful authentication.
    pub is_authenticated: bool,
    /// Most recent pairing QR payload, if any.
    pub last_qr: Option<String>,
    /// Last successful activity timestamp.
    pub last_activity: Option<DateTime<Utc>>,
    /// Process start time.
    pub started_at: DateTime<Utc>,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self {
            total_messages: 0,
            total_chats: 0,
            active_chats: 0,
            voice_chats: 0,
            audio_messages: 0,
            connection_status: "disconnected".to_owned(),
            is_authenticated: false,
            last_qr: None,
            last_activity: None,
            started_at: Utc::now(),
        }
    }
}

/// Per-conversation summary exposed to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub active: bool,
    pub has_custom_prompt: bool,
    pub prompt_preview: String,
    pub turn_count: usize,
    pub voice_enabled: bool,
    pub voice_identity: VoiceIdentity,
}

/// Read-only snapshot served by the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub stats: GlobalStats,
    pub conversations: Vec<ConversationSummary>,
}

/// Keyed mapping from conversation id to chat and voice state.
pub struct Store {
    default_prompt: String,
    default_voice: VoiceIdentity,
    conversations: HashMap<ConversationId, ConversationState>,
    voices: HashMap<ConversationId, VoiceState>,
    /// Global counters; mutated only alongside the owning maps.
    pub stats: GlobalStats,
}

impl Store {
    #[must_use]
    pub fn new(default_prompt: impl Into<String>, default_voice: VoiceIdentity) -> Self {
        Self {
            default_prompt: default_prompt.into(),
            default_voice,
            conversations: HashMap::new(),
            voices: HashMap::new(),
            stats: GlobalStats::default(),
        }
    }

    /// Default system prompt for new conversations and `/prompt reset`.
    #[must_use]
    pub fn default_prompt(&self) -> &str {
        &self.default_prompt
    }

    /// Default voice identity for new conversations and `/voz reset`.
    #[must_use]
    pub fn default_voice(&self) -> VoiceIdentity {
        self.default_voice
    }

    /// Existing state, or a fresh default entry. Bumps `total_chats` exactly
    /// once per id and touches `last_activity`.
    pub fn get_or_create(&mut self, id: &ConversationId) -> &mut ConversationState {
        let state = self.conversations.entry(id.clone()).or_insert_with(|| {
            self.stats.total_chats += 1;
            ConversationState::new(self.default_prompt.clone())
        });
        state.last_activity = Utc::now();
        state
    }

    /// Existing voice preferences, or a fresh default entry. No stats side
    /// effect.
    pub fn get_or_create_voice(&mut self, id: &ConversationId) -> &mut VoiceState {
        self.voices
            .entry(id.clone())
            .or_insert_with(|| VoiceState::new(self.default_voice))
    }

    /// Read-only lookup.
    #[must_use]
    pub fn get(&self, id: &ConversationId) -> Option<&ConversationState> {
        self.conversations.get(id)
    }

    /// Toggle the generator for a conversation, keeping `active_chats` in
    /// step. Returns the new value.
    pub fn toggle_active(&mut self, id: &ConversationId) -> bool {
        let state = self.get_or_create(id);
        state.active = !state.active;
        let active = state.active;
        if active {
            self.stats.active_chats += 1;
        } else {
            self.stats.active_chats = self.stats.active_chats.saturating_sub(1);
        }
        active
    }

    /// Set the per-chat voice toggle, keeping `voice_chats` in step. Mirrors
    /// the value into `auto_voice`.
    pub fn set_voice_enabled(&mut self, id: &ConversationId, enabled: bool) {
        let state = self.get_or_create_voice(id);
        let was_enabled = state.voice_enabled;
        state.voice_enabled = enabled;
        state.auto_voice = enabled;
        match (was_enabled, enabled) {
            (false, true) => self.stats.voice_chats += 1,
            (true, false) => {
                self.stats.voice_chats = self.stats.voice_chats.saturating_sub(1);
            }
            _ => {}
        }
    }

    /// Evict conversations idle longer than `ttl`, adjusting the incremental
    /// counters for whatever is removed. Returns the number of evicted
    /// conversations. Runs off the request path.
    pub fn sweep_idle(&mut self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;

        let idle: Vec<ConversationId> = self
            .conversations
            .iter()
            .filter(|(_, state)| state.last_activity < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &idle {
            if let Some(state) = self.conversations.remove(id)
                && state.active
            {
                self.stats.active_chats = self.stats.active_chats.saturating_sub(1);
            }
            if let Some(voice) = self.voices.remove(id)
                && voice.voice_enabled
            {
                self.stats.voice_chats = self.stats.voice_chats.saturating_sub(1);
            }
        }

        if !idle.is_empty() {
            info!("evicted {} idle conversations", idle.len());
        }
        idle.len()
    }

    /// Snapshot of stats plus per-conversation summaries for the dashboard.
    #[must_use]
    pub fn dashboard_snapshot(&self) -> DashboardSnapshot {
        let mut conversations: Vec<ConversationSummary> = self
            .conversations
            .iter()
            .map(|(id, state)| {
                let voice = self.voices.get(id);
                ConversationSummary {
                    id: id.clone(),
                    active: state.active,
                    has_custom_prompt: state.system_prompt != self.default_prompt,
                    prompt_preview: state
                        .system_prompt
                        .chars()
                        .take(PROMPT_PREVIEW_CHARS)
                        .collect(),
                    turn_count: state.transcript.len(),
                    voice_enabled: voice.is_some_and(|v| v.voice_enabled),
                    voice_identity: voice
                        .map_or(self.default_voice, |v| v.voice_identity),
                }
            })
            .collect();
        conversations.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

        DashboardSnapshot {
            stats: self.stats.clone(),
            conversations,
        }
    }
}
