//! Domain entities for the chat relay.

pub mod event;
pub mod room;

pub use event::{ChatEvent, ParticipantId, Position};
pub use room::{RoomKeys, BROADCAST_KEY_PREFIX, LOG_KEY_PREFIX};
