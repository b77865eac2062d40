//! Room broadcast channel: ephemeral fan-out to whoever is subscribed right now.

pub mod memory;
pub mod redis_pubsub;

pub use memory::InMemoryBroadcast;
pub use redis_pubsub::RedisBroadcast;

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::ChatResult;

/// Fan-out of serialized payloads, partitioned by broadcast key.
///
/// There is no backlog: a subscription only sees what is published after it
/// was created. A publisher that is also subscribed receives its own payloads.
#[async_trait]
pub trait RoomBroadcast: Send + Sync {
    async fn subscribe(&self, broadcast_key: &str) -> ChatResult<Box<dyn Subscription>>;

    async fn publish(&self, broadcast_key: &str, payload: Bytes) -> ChatResult<()>;
}

/// A live registration on one broadcast key.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next payload. `Ok(None)` means the subscription was closed.
    ///
    /// Cancel-safe: dropping the future loses no payload.
    async fn next(&mut self) -> ChatResult<Option<Bytes>>;

    /// Release the registration.
    async fn close(self: Box<Self>);
}
