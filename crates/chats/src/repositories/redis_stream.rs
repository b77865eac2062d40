//! Room log stored as one Redis Stream per room.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamMaxlen, StreamRangeReply};
use redis::AsyncCommands;

use super::RoomLog;
use crate::entities::{ChatEvent, ParticipantId, Position};
use crate::types::{ChatError, ChatResult};

const FIELD_PARTICIPANT: &str = "participant";
const FIELD_ROOM: &str = "room";
const FIELD_PAYLOAD: &str = "payload";

/// Redis Streams-backed room log.
///
/// Each append is an `XADD` to the room's log key, trimmed to `max_len`
/// entries when a cap is configured. Replay is `XRANGE - +`.
#[derive(Clone)]
pub struct RedisRoomLog {
    conn: ConnectionManager,
    max_len: Option<usize>,
}

impl RedisRoomLog {
    pub fn new(conn: ConnectionManager, max_len: Option<usize>) -> Self {
        Self { conn, max_len }
    }

    fn decode(entry: &StreamId) -> ChatResult<ChatEvent> {
        let position: Position = entry
            .id
            .parse()
            .map_err(|_| ChatError::history_replay(format!("invalid stream id '{}'", entry.id)))?;

        let field = |name: &str| {
            ChatError::history_replay(format!("entry {} is missing '{name}'", entry.id))
        };

        let participant: String = entry.get(FIELD_PARTICIPANT).ok_or_else(|| field(FIELD_PARTICIPANT))?;
        let participant: ParticipantId = participant.parse().map_err(|error| {
            ChatError::history_replay(format!("entry {} has invalid participant: {error}", entry.id))
        })?;
        let room: String = entry.get(FIELD_ROOM).ok_or_else(|| field(FIELD_ROOM))?;
        let payload: Vec<u8> = entry.get(FIELD_PAYLOAD).ok_or_else(|| field(FIELD_PAYLOAD))?;

        Ok(ChatEvent::new(participant, room, payload).with_position(position))
    }
}

#[async_trait]
impl RoomLog for RedisRoomLog {
    async fn append(&self, log_key: &str, event: &ChatEvent) -> ChatResult<Position> {
        let mut conn = self.conn.clone();
        let participant = event.participant.to_string();
        let fields: [(&str, &[u8]); 3] = [
            (FIELD_PARTICIPANT, participant.as_bytes()),
            (FIELD_ROOM, event.room.as_bytes()),
            (FIELD_PAYLOAD, event.payload.as_ref()),
        ];

        let appended: redis::RedisResult<String> = match self.max_len {
            Some(max_len) => {
                conn.xadd_maxlen(log_key, StreamMaxlen::Equals(max_len), "*", &fields)
                    .await
            }
            None => conn.xadd(log_key, "*", &fields).await,
        };
        let id = appended
            .map_err(|error| ChatError::persistence(format!("XADD {log_key}: {error}")))?;

        id.parse()
    }

    async fn read_all(&self, log_key: &str) -> ChatResult<Vec<ChatEvent>> {
        let mut conn = self.conn.clone();
        let reply: StreamRangeReply = conn
            .xrange_all(log_key)
            .await
            .map_err(|error| ChatError::history_replay(format!("XRANGE {log_key}: {error}")))?;

        reply.ids.iter().map(Self::decode).collect()
    }
}
