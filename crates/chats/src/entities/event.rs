//! Chat events and the identifiers attached to them.

use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::types::{ChatError, ChatResult};

/// Opaque identifier of the principal behind a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Stand-in for a principal the identity layer could not resolve.
    pub const ANONYMOUS: ParticipantId = ParticipantId(Uuid::nil());

    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ParticipantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Position of an event inside a room log, written `<millis>-<seq>`.
///
/// Ordering follows the numeric pair, so positions handed out by the log
/// compare in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    millis: u64,
    seq: u64,
}

impl Position {
    pub fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    pub fn millis(&self) -> u64 {
        self.millis
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for Position {
    type Err = ChatError;

    fn from_str(s: &str) -> ChatResult<Self> {
        let invalid = || ChatError::persistence(format!("invalid log position '{s}'"));
        let (millis, seq) = s.split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            millis: millis.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        })
    }
}

/// One chat message. Immutable once the log has assigned its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub participant: ParticipantId,
    pub room: String,
    pub payload: Bytes,
    /// `None` until appended.
    pub position: Option<Position>,
}

impl ChatEvent {
    pub fn new(participant: ParticipantId, room: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            participant,
            room: room.into(),
            payload: payload.into(),
            position: None,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}
