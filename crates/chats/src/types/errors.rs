//! Error types for the chat relay.

use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Terminal conditions of a chat session.
///
/// Every variant except [`ChatError::ConnectionClosed`] is fatal to the
/// session that observes it. Nothing is retried inside the relay.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Room name must not be empty")]
    InvalidRoom,

    #[error("Handshake failed: {message}")]
    Handshake { message: String },

    #[error("History replay failed: {message}")]
    HistoryReplay { message: String },

    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    #[error("Broadcast unavailable: {message}")]
    BroadcastUnavailable { message: String },

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl ChatError {
    /// Create a handshake error
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake { message: message.into() }
    }

    /// Create a history replay error
    pub fn history_replay(message: impl Into<String>) -> Self {
        Self::HistoryReplay { message: message.into() }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into() }
    }

    /// Create a broadcast unavailable error
    pub fn broadcast_unavailable(message: impl Into<String>) -> Self {
        Self::BroadcastUnavailable { message: message.into() }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Clean peer closure is a normal ending, not a failure.
    pub fn is_normal_closure(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}
