//! Durable room log: the append-only, per-room history replayed on join.

pub mod memory;
pub mod redis_stream;

pub use memory::InMemoryRoomLog;
pub use redis_stream::RedisRoomLog;

use async_trait::async_trait;

use crate::entities::{ChatEvent, Position};
use crate::types::ChatResult;

/// Append-only storage of chat events, keyed by a room's log key.
///
/// The log is the single source of ordering for a room. Implementations may
/// apply a retention cap, in which case the oldest events are evicted first.
#[async_trait]
pub trait RoomLog: Send + Sync {
    /// Store `event` at the next position of the room's log.
    ///
    /// Failure is reported as [`crate::ChatError::Persistence`] and the event
    /// is not stored.
    async fn append(&self, log_key: &str, event: &ChatEvent) -> ChatResult<Position>;

    /// Snapshot of every retained event, oldest first, each carrying its
    /// position.
    async fn read_all(&self, log_key: &str) -> ChatResult<Vec<ChatEvent>>;
}
