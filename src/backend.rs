//! Generative-AI backend collaborator.
//!
//! The core only talks to the [`Backend`] trait; the shipped implementation
//! targets an OpenAI-compatible chat-completions API plus a session-scoped
//! voice exchange endpoint. Audio bytes are opaque to this module; they are
//! base64-encoded on the JSON wire and never inspected.

use crate::config::BackendConfig;
use crate::error::{BotError, Result};
use crate::voice::VoiceIdentity;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

/// Opaque audio payload passed between transport, backend, and replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    /// Raw audio bytes.
    pub data: Vec<u8>,
    /// MIME type as reported by the producer (e.g. `audio/ogg`).
    pub mime: String,
}

/// Handle to a live voice session held by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Backend-assigned session identifier.
    pub id: String,
}

/// Input side of a session exchange.
#[derive(Debug, Clone)]
pub enum ExchangeInput {
    /// Text to be spoken (text-to-speech path).
    Text(String),
    /// User voice message (speech-to-speech path).
    Audio(AudioPayload),
}

/// Result of a session exchange; either part may be absent.
#[derive(Debug, Clone, Default)]
pub struct ExchangeReply {
    /// Response text, when the backend produced one.
    pub text: Option<String>,
    /// Response audio, when the backend produced one.
    pub audio: Option<AudioPayload>,
}

/// Generative-AI backend contract.
#[async_trait]
pub trait Backend: Send + Sync {
    /// One-shot text generation for the given effective prompt.
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Open a voice session parameterized by system prompt and voice identity.
    async fn open_voice_session(
        &self,
        system_prompt: &str,
        identity: VoiceIdentity,
    ) -> Result<SessionHandle>;

    /// Session-scoped exchange; text in gives speech out, audio in gives a
    /// spoken reply plus its transcription when available.
    async fn exchange(
        &self,
        session: &SessionHandle,
        input: ExchangeInput,
    ) -> Result<ExchangeReply>;
}

/// HTTP backend against an OpenAI-compatible API.
pub struct HttpBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            config: config.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn base_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn request(&self, url: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut req = self.client.post(url).json(body);
        if !self.config.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.config.api_key));
        }
        req
    }

    async fn send(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .request(url, body)
            .send()
            .await
            .map_err(|e| BotError::Backend(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BotError::Backend(format!(
                "backend returned {status}: {detail}"
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| BotError::Backend(format!("invalid JSON from {url}: {e}")))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url());
        let body = serde_json::json!({
            "model": self.config.api_model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let reply = self.send(&url, &body).await?;
        let text = reply["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(BotError::Backend(
                "backend response contained no text".to_owned(),
            ));
        }
        debug!("generated {} chars", text.len());
        Ok(text.to_owned())
    }

    async fn open_voice_session(
        &self,
        system_prompt: &str,
        identity: VoiceIdentity,
    ) -> Result<SessionHandle> {
        let url = format!("{}/v1/voice/sessions", self.base_url());
        let body = serde_json::json!({
            "model": self.config.api_model,
            "voice": identity.as_str(),
            "instructions": system_prompt,
        });

        let reply = self.send(&url, &body).await?;
        let id = reply["id"].as_str().unwrap_or_default();
        if id.is_empty() {
            return Err(BotError::Voice(
                "backend session response contained no id".to_owned(),
            ));
        }
        Ok(SessionHandle { id: id.to_owned() })
    }

    async fn exchange(
        &self,
        session: &SessionHandle,
        input: ExchangeInput,
    ) -> Result<ExchangeReply> {
        let url = format!("{}/v1/voice/sessions/{}/exchange", self.base_url(), session.id);
        let body = match input {
            ExchangeInput::Text(text) => serde_json::json!({ "text": text }),
            ExchangeInput::Audio(audio) => serde_json::json!({
                "audio": BASE64.encode(&audio.data),
                "mime": audio.mime,
            }),
        };

        let reply = self.send(&url, &body).await?;
        Ok(parse_exchange_reply(&reply))
    }
}

/// Map the backend's variable-shaped response onto the tagged union the core
/// consumes. Unknown or undecodable parts are simply absent.
fn parse_exchange_reply(value: &serde_json::Value) -> ExchangeReply {
    let text = value["text"]
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned);
    let audio = value["audio"].as_str().and_then(|encoded| {
        let data = BASE64.decode(encoded).ok()?;
        let mime = value["mime"].as_str().unwrap_or("audio/ogg").to_owned();
        Some(AudioPayload { data, mime })
    });
    ExchangeReply { text, audio }
}
