//! Transcript types and the bounded context window.
//!
//! The stored transcript is append-only; trimming only limits what is read
//! when a generation prompt is built, never what is retained.

use crate::store::ConversationState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribution of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// Message received from the chat participant.
    User,
    /// Response produced by the generator.
    Bot,
    /// Administrative note (for example a prompt change).
    System,
}

impl Speaker {
    /// Label used when serializing a turn into a generation prompt.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Bot => "Bot",
            Self::System => "System",
        }
    }
}

/// One message-equivalent unit in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the turn.
    pub speaker: Speaker,
    /// Turn text.
    pub text: String,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ConversationState {
    /// Append a turn with the current timestamp. Never trims.
    pub fn append_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(Turn {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    /// The last `n` turns in chronological order, fewer if the transcript is
    /// shorter. Pure read.
    #[must_use]
    pub fn windowed(&self, n: usize) -> &[Turn] {
        let start = self.transcript.len().saturating_sub(n);
        &self.transcript[start..]
    }

    /// Serialize the context window into prompt lines (`Speaker: text`).
    #[must_use]
    pub fn rendered_window(&self, n: usize) -> String {
        let mut out = String::new();
        for turn in self.windowed(n) {
            out.push_str(turn.speaker.label());
            out.push_str(": ");
            out.push_str(&turn.text);
            out.push('\n');
        }
        out
    }
}
