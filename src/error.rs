//! Error types for the bot core.

/// Top-level error type for the chat bot.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Generative-AI backend call error.
    #[error("backend error: {0}")]
    Backend(String),

    /// Voice session error (open or exchange).
    #[error("voice error: {0}")]
    Voice(String),

    /// Messaging transport delivery error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BotError>;
