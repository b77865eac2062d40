//! Room naming.
//!
//! The key prefixes are visible to anything else reading or writing chat data
//! in the broker, so they must not change.

use crate::types::{ChatError, ChatResult};

pub const LOG_KEY_PREFIX: &str = "chatstream:";
pub const BROADCAST_KEY_PREFIX: &str = "chatroom:";

/// The two broker keys derived from a room name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKeys {
    room: String,
    log_key: String,
    broadcast_key: String,
}

impl RoomKeys {
    /// Derive the keys for `room`. Empty names are rejected.
    pub fn new(room: impl Into<String>) -> ChatResult<Self> {
        let room = room.into();
        if room.is_empty() {
            return Err(ChatError::InvalidRoom);
        }

        Ok(Self {
            log_key: format!("{LOG_KEY_PREFIX}{room}"),
            broadcast_key: format!("{BROADCAST_KEY_PREFIX}{room}"),
            room,
        })
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn log_key(&self) -> &str {
        &self.log_key
    }

    pub fn broadcast_key(&self) -> &str {
        &self.broadcast_key
    }
}
