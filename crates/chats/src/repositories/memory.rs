//! In-process room log for development and tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use super::RoomLog;
use crate::entities::{ChatEvent, Position};
use crate::types::{ChatError, ChatResult};

#[derive(Default)]
struct LogState {
    streams: HashMap<String, VecDeque<ChatEvent>>,
    last: Option<Position>,
}

/// Room log kept in a process-local map.
///
/// Positions mimic stream ids: wall-clock milliseconds plus a sequence that
/// keeps them strictly increasing across every room.
pub struct InMemoryRoomLog {
    state: Mutex<LogState>,
    max_len: Option<usize>,
}

impl InMemoryRoomLog {
    pub fn new(max_len: Option<usize>) -> Self {
        Self {
            state: Mutex::new(LogState::default()),
            max_len,
        }
    }

    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    fn next_position(last: Option<Position>) -> Position {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        match last {
            Some(last) if last.millis() >= now => Position::new(last.millis(), last.seq() + 1),
            _ => Position::new(now, 0),
        }
    }
}

impl Default for InMemoryRoomLog {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl RoomLog for InMemoryRoomLog {
    async fn append(&self, log_key: &str, event: &ChatEvent) -> ChatResult<Position> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ChatError::persistence("room log lock poisoned"))?;

        let position = Self::next_position(state.last);
        state.last = Some(position);

        let stream = state.streams.entry(log_key.to_string()).or_default();
        stream.push_back(event.clone().with_position(position));
        if let Some(max_len) = self.max_len {
            while stream.len() > max_len {
                stream.pop_front();
            }
        }

        Ok(position)
    }

    async fn read_all(&self, log_key: &str) -> ChatResult<Vec<ChatEvent>> {
        let state = self
            .state
            .lock()
            .map_err(|_| ChatError::history_replay("room log lock poisoned"))?;

        Ok(state
            .streams
            .get(log_key)
            .map(|stream| stream.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ParticipantId;

    fn event(payload: &'static str) -> ChatEvent {
        ChatEvent::new(ParticipantId::ANONYMOUS, "r1", payload)
    }

    #[tokio::test]
    async fn read_all_returns_events_in_append_order() {
        let log = InMemoryRoomLog::default();
        let mut positions = Vec::new();
        for payload in ["a", "b", "c", "d"] {
            positions.push(log.append("chatstream:r1", &event(payload)).await.unwrap());
        }

        let events = log.read_all("chatstream:r1").await.unwrap();
        let payloads: Vec<_> = events.iter().map(|e| e.payload.clone()).collect();
        assert_eq!(payloads, vec!["a", "b", "c", "d"]);

        let stored: Vec<_> = events.iter().map(|e| e.position.unwrap()).collect();
        assert_eq!(stored, positions);
        assert!(stored.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn unknown_room_reads_empty() {
        let log = InMemoryRoomLog::default();
        assert!(log.read_all("chatstream:nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retention_evicts_oldest_first() {
        let log = InMemoryRoomLog::new(Some(2));
        for payload in ["one", "two", "three"] {
            log.append("chatstream:r1", &event(payload)).await.unwrap();
        }

        let payloads: Vec<_> = log
            .read_all("chatstream:r1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.payload)
            .collect();
        assert_eq!(payloads, vec!["two", "three"]);
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let log = InMemoryRoomLog::new(Some(1));
        log.append("chatstream:a", &event("for-a")).await.unwrap();
        log.append("chatstream:b", &event("for-b")).await.unwrap();

        let a = log.read_all("chatstream:a").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].payload, "for-a");
    }
}
