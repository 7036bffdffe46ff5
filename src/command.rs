//! Administrative command grammar.
//!
//! Commands are matched on the first whitespace-separated token, by exact
//! string or literal prefix only. A message whose first token is a known
//! command but whose subcommand is unrecognized gets a usage reply; only
//! messages that start with no known token fall through to generation.

use crate::store::{ConversationId, Store};
use crate::transcript::Speaker;
use crate::voice::VoiceIdentity;

/// Maximum accepted system prompt length in characters.
pub const MAX_PROMPT_LEN: usize = 1000;

/// Result of running a message through the command grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Not a command; the caller proceeds to generation.
    NoMatch,
    /// Command handled; the caller sends the reply and stops.
    Handled {
        /// Text to send back to the chat.
        reply: String,
        /// Whether any cached voice session must be dropped so the next
        /// interaction opens one with the new configuration.
        invalidate_session: bool,
    },
}

impl CommandOutcome {
    fn handled(reply: impl Into<String>) -> Self {
        Self::Handled {
            reply: reply.into(),
            invalidate_session: false,
        }
    }

    fn handled_invalidating(reply: impl Into<String>) -> Self {
        Self::Handled {
            reply: reply.into(),
            invalidate_session: true,
        }
    }
}

/// Run a trimmed inbound message through the command grammar.
///
/// `session_live` reports whether a voice session is currently cached for
/// the conversation; it only affects the `/bot status` reply.
pub fn interpret(
    text: &str,
    store: &mut Store,
    id: &ConversationId,
    session_live: bool,
) -> CommandOutcome {
    let trimmed = text.trim();
    let (token, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim()),
        None => (trimmed, ""),
    };

    match token {
        "/bot" => bot_command(rest, store, id, session_live),
        "/voz" => voz_command(rest, store, id),
        "/prompt" => prompt_command(rest, store, id),
        _ => CommandOutcome::NoMatch,
    }
}

fn bot_command(
    rest: &str,
    store: &mut Store,
    id: &ConversationId,
    session_live: bool,
) -> CommandOutcome {
    match rest {
        "" => {
            let active = store.toggle_active(id);
            if active {
                CommandOutcome::handled(
                    "Bot activated for this chat. Send a message to start talking.",
                )
            } else {
                CommandOutcome::handled(
                    "Bot deactivated for this chat. Send /bot to enable it again.",
                )
            }
        }
        "status" => {
            let active = store.get_or_create(id).active;
            let voice = store.get_or_create_voice(id).clone();
            CommandOutcome::handled(format!(
                "Bot: {}\nVoice replies: {}\nVoice: {}\nAuto voice: {}\nLive voice session: {}",
                on_off(active),
                on_off(voice.voice_enabled),
                voice.voice_identity,
                on_off(voice.auto_voice),
                if session_live { "yes" } else { "no" },
            ))
        }
        _ => CommandOutcome::handled("Unknown bot command. Usage: /bot | /bot status"),
    }
}

fn voz_command(rest: &str, store: &mut Store, id: &ConversationId) -> CommandOutcome {
    match rest {
        "" => {
            let enabled = !store.get_or_create_voice(id).voice_enabled;
            store.set_voice_enabled(id, enabled);
            if enabled {
                let identity = store.get_or_create_voice(id).voice_identity;
                CommandOutcome::handled_invalidating(format!(
                    "Voice replies enabled (voice: {identity})."
                ))
            } else {
                CommandOutcome::handled_invalidating("Voice replies disabled.")
            }
        }
        "show" => {
            let voice = store.get_or_create_voice(id).clone();
            CommandOutcome::handled(format!(
                "Voice replies: {}\nVoice: {}\nAuto voice: {}\nAvailable voices: {}",
                on_off(voice.voice_enabled),
                voice.voice_identity,
                on_off(voice.auto_voice),
                voice_list(),
            ))
        }
        "reset" => {
            let default_voice = store.default_voice();
            store.set_voice_enabled(id, false);
            store.get_or_create_voice(id).voice_identity = default_voice;
            CommandOutcome::handled_invalidating(format!(
                "Voice settings restored to defaults (voice: {default_voice}, replies in text)."
            ))
        }
        name => match name.parse::<VoiceIdentity>() {
            Ok(identity) => {
                store.set_voice_enabled(id, true);
                store.get_or_create_voice(id).voice_identity = identity;
                CommandOutcome::handled_invalidating(format!(
                    "Voice set to {identity}. Replies will now be spoken."
                ))
            }
            Err(()) => CommandOutcome::handled(format!(
                "Unknown voice command `{name}`. Usage: /voz | /voz show | /voz reset | \
                 /voz <name>\nAvailable voices: {}",
                voice_list(),
            )),
        },
    }
}

fn prompt_command(rest: &str, store: &mut Store, id: &ConversationId) -> CommandOutcome {
    match rest {
        "show" => {
            let prompt = store.get_or_create(id).system_prompt.clone();
            CommandOutcome::handled(format!("Current system prompt:\n{prompt}"))
        }
        "reset" => {
            let default_prompt = store.default_prompt().to_owned();
            let state = store.get_or_create(id);
            let old = std::mem::replace(&mut state.system_prompt, default_prompt.clone());
            state.append_turn(Speaker::System, "System prompt reset to default.");
            CommandOutcome::handled_invalidating(format!(
                "System prompt reset to default.\nOld: {}\nNew: {}",
                preview(&old),
                preview(&default_prompt),
            ))
        }
        new_prompt => {
            if new_prompt.is_empty() {
                return CommandOutcome::handled(
                    "The prompt cannot be empty. Usage: /prompt <text>",
                );
            }
            let len = new_prompt.chars().count();
            if len > MAX_PROMPT_LEN {
                return CommandOutcome::handled(format!(
                    "The prompt is too long ({len} characters, limit {MAX_PROMPT_LEN}). \
                     Nothing was changed."
                ));
            }

            let state = store.get_or_create(id);
            let old = std::mem::replace(&mut state.system_prompt, new_prompt.to_owned());
            state.append_turn(
                Speaker::System,
                format!("System prompt changed to: {new_prompt}"),
            );
            CommandOutcome::handled_invalidating(format!(
                "System prompt updated.\nOld: {}\nNew: {}",
                preview(&old),
                preview(new_prompt),
            ))
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn voice_list() -> String {
    VoiceIdentity::ALL
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// First 80 characters, with an ellipsis when cut.
fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    if text.chars().count() <= LIMIT {
        text.to_owned()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{head}…")
    }
}
