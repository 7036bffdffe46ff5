//! Configuration types for the bot.
//!
//! Loaded from an optional TOML file; secrets can be supplied through the
//! environment (`CORO_API_KEY`) so they never need to live in the file.

use crate::error::{BotError, Result};
use crate::voice::VoiceIdentity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// System prompt used for every conversation until `/prompt` changes it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant replying inside a WhatsApp \
     conversation. Keep answers short, friendly, and conversational.";

/// Top-level configuration for the bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Conversation state and transcript settings.
    pub chat: ChatConfig,
    /// Voice reply settings.
    pub voice: VoiceConfig,
    /// Generative-AI backend connection settings.
    pub backend: BackendConfig,
    /// Outbound messaging transport settings.
    pub transport: TransportConfig,
    /// HTTP dashboard settings.
    pub dashboard: DashboardConfig,
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of most-recent transcript turns included in generation prompts.
    pub context_window: usize,
    /// Default system prompt for new conversations.
    pub system_prompt: String,
    /// Conversations idle longer than this are evicted by the sweep task.
    pub idle_ttl_secs: u64,
    /// Interval between eviction sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            context_window: 20,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            idle_ttl_secs: 86_400,
            sweep_interval_secs: 3_600,
        }
    }
}

/// Voice reply settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Voice identity used until `/voz <name>` changes it.
    pub default_identity: VoiceIdentity,
    /// Whether an inbound voice message is always answered in voice,
    /// regardless of the per-chat voice toggle.
    pub audio_reply_in_voice: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            default_identity: VoiceIdentity::default(),
            audio_reply_in_voice: true,
        }
    }
}

/// Generative-AI backend connection settings (OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend API.
    pub api_url: String,
    /// Model identifier sent with every request.
    pub api_model: String,
    /// API key; empty means no Authorization header. Overridden by
    /// `CORO_API_KEY` when set.
    pub api_key: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434".to_owned(),
            api_model: "gemini-2.0-flash-exp".to_owned(),
            api_key: String::new(),
        }
    }
}

/// Outbound messaging transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Webhook URL replies are POSTed to.
    pub outbound_url: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            outbound_url: "http://localhost:3000/send".to_owned(),
        }
    }
}

/// HTTP dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Whether the dashboard server is started.
    pub enabled: bool,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_owned(),
            port: 10_000,
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BotError::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|e| {
            BotError::Config(format!("invalid config {}: {e}", path.display()))
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("CORO_API_KEY")
            && !key.trim().is_empty()
        {
            self.backend.api_key = key.trim().to_owned();
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.trim().parse::<u16>()
        {
            self.dashboard.port = port;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.chat.context_window == 0 {
            return Err(BotError::Config(
                "chat.context_window must be at least 1".to_owned(),
            ));
        }
        if self.chat.system_prompt.trim().is_empty() {
            return Err(BotError::Config(
                "chat.system_prompt must not be empty".to_owned(),
            ));
        }
        if self.backend.api_url.trim().is_empty() {
            return Err(BotError::Config(
                "backend.api_url must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}
