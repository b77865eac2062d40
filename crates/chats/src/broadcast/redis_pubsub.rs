//! Broadcast channel over Redis Pub/Sub, shared by every relay instance.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Msg};
use tracing::debug;

use super::{RoomBroadcast, Subscription};
use crate::types::{ChatError, ChatResult};

/// Publishes through a shared connection manager; every subscription gets a
/// dedicated pub/sub connection so a slow reader only backs up itself.
#[derive(Clone)]
pub struct RedisBroadcast {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisBroadcast {
    pub fn new(client: redis::Client, conn: ConnectionManager) -> Self {
        Self { client, conn }
    }
}

#[async_trait]
impl RoomBroadcast for RedisBroadcast {
    async fn subscribe(&self, broadcast_key: &str) -> ChatResult<Box<dyn Subscription>> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|error| {
            ChatError::broadcast_unavailable(format!("pub/sub connection: {error}"))
        })?;
        pubsub.subscribe(broadcast_key).await.map_err(|error| {
            ChatError::broadcast_unavailable(format!("SUBSCRIBE {broadcast_key}: {error}"))
        })?;

        Ok(Box::new(RedisSubscription {
            key: broadcast_key.to_string(),
            messages: pubsub.into_on_message().boxed(),
        }))
    }

    async fn publish(&self, broadcast_key: &str, payload: Bytes) -> ChatResult<()> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn
            .publish(broadcast_key, payload.as_ref())
            .await
            .map_err(|error| {
                ChatError::broadcast_unavailable(format!("PUBLISH {broadcast_key}: {error}"))
            })?;

        debug!(key = broadcast_key, receivers, "published chat payload");
        Ok(())
    }
}

struct RedisSubscription {
    key: String,
    messages: BoxStream<'static, Msg>,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn next(&mut self) -> ChatResult<Option<Bytes>> {
        match self.messages.next().await {
            Some(message) => Ok(Some(Bytes::copy_from_slice(message.get_payload_bytes()))),
            // Only an explicit close may end a subscription; a dropped pub/sub
            // connection is a broker failure.
            None => Err(ChatError::broadcast_unavailable(format!(
                "pub/sub stream for {} ended",
                self.key
            ))),
        }
    }

    async fn close(self: Box<Self>) {
        // Dropping the stream closes the dedicated connection, which
        // unsubscribes on the server side.
        debug!(key = %self.key, "closing pub/sub subscription");
    }
}
