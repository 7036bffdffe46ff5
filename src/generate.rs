//! Response generation and reply channel selection.
//!
//! Backend failures are swallowed at this boundary: the user gets a generic
//! apology, nothing is recorded, and no counters move. They never propagate
//! far enough to stop the event loop.

use crate::backend::AudioPayload;
use crate::error::Result;
use crate::router::Engine;
use crate::store::ConversationId;
use crate::transcript::Speaker;
use crate::transport::OutboundContent;
use crate::voice::VoiceIdentity;
use chrono::Utc;
use tracing::warn;

/// Reply sent when a backend call fails.
pub const APOLOGY: &str =
    "Sorry, something went wrong while processing your message. Please try again in a moment.";

/// Annotation appended when a voice reply could not be synthesized.
const VOICE_FALLBACK_NOTE: &str = "[voice reply unavailable]";

/// Transcript placeholder for an inbound voice message.
const VOICE_MESSAGE_NOTE: &str = "[voice message]";

/// Generation parameters snapshotted from the store before any await.
struct GenerationContext {
    system_prompt: String,
    window: String,
    wants_voice: bool,
    voice_identity: VoiceIdentity,
}

impl Engine {
    /// Generate and deliver a text response for an ordinary message.
    pub(crate) async fn respond_text(&mut self, id: &ConversationId, text: &str) -> Result<()> {
        let ctx = self.generation_context(id);
        let prompt = build_prompt(&ctx.system_prompt, &ctx.window, text);

        let response = match self.backend.generate_text(&prompt).await {
            Ok(response) => response,
            Err(err) => {
                warn!("generation failed for {id}: {err}");
                self.deliver(id, APOLOGY.to_owned(), None).await;
                return Ok(());
            }
        };

        self.with_store(|store| {
            let state = store.get_or_create(id);
            state.append_turn(Speaker::User, text);
            state.append_turn(Speaker::Bot, response.clone());
            store.stats.total_messages += 1;
            store.stats.last_activity = Some(Utc::now());
        });

        let audio = if ctx.wants_voice {
            self.sessions
                .send_text(
                    self.backend.as_ref(),
                    id,
                    &ctx.system_prompt,
                    ctx.voice_identity,
                    &response,
                )
                .await
        } else {
            None
        };

        let text_reply = if ctx.wants_voice && audio.is_none() {
            format!("{response}\n\n{VOICE_FALLBACK_NOTE}")
        } else {
            response
        };
        self.deliver(id, text_reply, audio).await;
        Ok(())
    }

    /// Exchange an inbound voice message through the conversation's voice
    /// session and deliver the reply.
    pub(crate) async fn respond_audio(
        &mut self,
        id: &ConversationId,
        audio: AudioPayload,
    ) -> Result<()> {
        let ctx = self.generation_context(id);

        let reply = match self
            .sessions
            .send_audio(
                self.backend.as_ref(),
                id,
                &ctx.system_prompt,
                ctx.voice_identity,
                audio,
            )
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                warn!("audio exchange failed for {id}: {err}");
                self.deliver(id, APOLOGY.to_owned(), None).await;
                return Ok(());
            }
        };

        let response_text = reply
            .text
            .clone()
            .unwrap_or_else(|| VOICE_FALLBACK_NOTE.to_owned());

        self.with_store(|store| {
            let state = store.get_or_create(id);
            state.append_turn(Speaker::User, VOICE_MESSAGE_NOTE);
            state.append_turn(Speaker::Bot, response_text.clone());
            store.stats.total_messages += 1;
            store.stats.audio_messages += 1;
            store.stats.last_activity = Some(Utc::now());
        });

        // Reply in voice when configured to always do so for voice messages,
        // or when the chat has voice replies enabled.
        let reply_audio = if self.config.voice.audio_reply_in_voice || ctx.wants_voice {
            reply.audio
        } else {
            None
        };
        self.deliver(id, response_text, reply_audio).await;
        Ok(())
    }

    /// Deliver a reply, preferring audio when present. A failed audio send
    /// falls back to one text attempt; a failed text send is dropped with a
    /// warning (no retry queue).
    pub(crate) async fn deliver(
        &self,
        to: &ConversationId,
        text: String,
        audio: Option<AudioPayload>,
    ) {
        if let Some(audio) = audio {
            match self
                .transport
                .reply(to, OutboundContent::Audio(audio))
                .await
            {
                Ok(()) => return,
                Err(err) => {
                    warn!("audio reply failed for {to}: {err}; falling back to text");
                }
            }
        }
        if let Err(err) = self.transport.reply(to, OutboundContent::Text(text)).await {
            warn!("reply dropped for {to}: {err}");
        }
    }

    fn generation_context(&self, id: &ConversationId) -> GenerationContext {
        self.with_store(|store| {
            let window = store
                .get_or_create(id)
                .rendered_window(self.config.chat.context_window);
            let system_prompt = store.get_or_create(id).system_prompt.clone();
            let voice = store.get_or_create_voice(id).clone();
            GenerationContext {
                system_prompt,
                window,
                wants_voice: voice.wants_voice(),
                voice_identity: voice.voice_identity,
            }
        })
    }
}

/// Effective prompt: system prompt, then the transcript window, then the new
/// user turn.
fn build_prompt(system_prompt: &str, window: &str, text: &str) -> String {
    if window.is_empty() {
        format!("{system_prompt}\n\nNew message: {text}")
    } else {
        format!("{system_prompt}\n\nPrevious conversation:\n{window}\nNew message: {text}")
    }
}
