//! Messaging transport collaborator.
//!
//! The transport authenticates to the chat network, delivers inbound message
//! events, and accepts outbound replies. The core only sees the types and
//! traits here; the shipped implementation forwards replies to a webhook.

use crate::backend::AudioPayload;
use crate::config::TransportConfig;
use crate::error::{BotError, Result};
use crate::store::ConversationId;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

/// One inbound message event from the chat network.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Correlation id for logging.
    pub id: String,
    /// Conversation the message arrived in.
    pub from: ConversationId,
    /// Message text, empty for pure voice messages.
    pub body: String,
    /// Whether the message came from a group conversation.
    pub is_group: bool,
    /// Whether the message is an echo of the bot's own output.
    pub is_self: bool,
    /// Voice message payload, if the event carries one.
    pub audio: Option<AudioPayload>,
}

/// Outbound reply content.
#[derive(Debug, Clone)]
pub enum OutboundContent {
    Text(String),
    Audio(AudioPayload),
}

/// Transport connection lifecycle signals.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Pairing QR payload was (re)issued.
    Qr(String),
    /// Transport is connected and message delivery has started.
    Ready,
    /// Authentication with the chat network succeeded.
    Authenticated,
    /// Authentication failed.
    AuthFailure(String),
    /// Connection lost; all cached voice sessions are discarded.
    Disconnected(String),
}

/// Outbound side of the messaging transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a reply to the given conversation.
    async fn reply(&self, to: &ConversationId, content: OutboundContent) -> Result<()>;
}

/// Transport implementation that POSTs replies to a webhook bridge.
pub struct WebhookTransport {
    outbound_url: String,
    client: reqwest::Client,
}

impl WebhookTransport {
    #[must_use]
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            outbound_url: config.outbound_url.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn reply(&self, to: &ConversationId, content: OutboundContent) -> Result<()> {
        let body = match content {
            OutboundContent::Text(text) => serde_json::json!({
                "to": to.as_str(),
                "type": "text",
                "text": text,
            }),
            OutboundContent::Audio(audio) => serde_json::json!({
                "to": to.as_str(),
                "type": "audio",
                "audio": BASE64.encode(&audio.data),
                "mime": audio.mime,
            }),
        };

        let response = self
            .client
            .post(&self.outbound_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Transport(format!("reply send failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BotError::Transport(format!(
                "reply rejected ({status}): {detail}"
            )));
        }
        Ok(())
    }
}
