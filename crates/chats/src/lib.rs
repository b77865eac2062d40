//! # Tuber Chats Crate
//!
//! Real-time chat relay for trip rooms. A participant connects to a room,
//! receives the room's retained history, then exchanges live messages with
//! everyone else connected to the same room, on this instance or any other
//! instance sharing the broker.
//!
//! ## Architecture
//!
//! - **Entities**: room keys, chat events, participant ids, log positions
//! - **Repositories**: the durable room log (Redis Streams or in-memory)
//! - **Broadcast**: the room broadcast channel (Redis Pub/Sub or in-memory)
//! - **Session**: the transport-facing reader/writer halves of one connection
//! - **Services**: the [`ChatRelay`] orchestrating replay, ingest and delivery
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tuber_chats::{ChatRelay, InMemoryBroadcast, InMemoryRoomLog, ParticipantId, Session};
//!
//! let relay = ChatRelay::new(
//!     Arc::new(InMemoryRoomLog::new(Some(1000))),
//!     Arc::new(InMemoryBroadcast::new(256)),
//! );
//! relay.handle("trip-42", ParticipantId::ANONYMOUS, Session::new(reader, writer)).await?;
//! ```

pub mod broadcast;
pub mod entities;
pub mod repositories;
pub mod services;
pub mod session;
pub mod types;

pub use broadcast::{InMemoryBroadcast, RedisBroadcast, RoomBroadcast, Subscription};
pub use entities::{ChatEvent, ParticipantId, Position, RoomKeys};
pub use repositories::{InMemoryRoomLog, RedisRoomLog, RoomLog};
pub use services::ChatRelay;
pub use session::{FrameReader, FrameWriter, Session, SessionState, SessionStateWatch};
pub use types::{ChatError, ChatResult};
