//! Process-local broadcast channel built on `tokio::sync::broadcast`.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

use super::{RoomBroadcast, Subscription};
use crate::types::ChatResult;

type Channels = Arc<RwLock<HashMap<String, broadcast::Sender<Bytes>>>>;

/// Broadcast hub holding one channel per key.
///
/// Each subscriber owns a bounded queue of `capacity` payloads. A subscriber
/// that falls further behind loses the oldest payloads rather than slowing
/// down publishers.
#[derive(Clone)]
pub struct InMemoryBroadcast {
    channels: Channels,
    capacity: usize,
}

impl InMemoryBroadcast {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscriptions on `broadcast_key`.
    pub async fn subscriber_count(&self, broadcast_key: &str) -> usize {
        self.channels
            .read()
            .await
            .get(broadcast_key)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryBroadcast {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl RoomBroadcast for InMemoryBroadcast {
    async fn subscribe(&self, broadcast_key: &str) -> ChatResult<Box<dyn Subscription>> {
        let mut channels = self.channels.write().await;
        let receiver = channels
            .entry(broadcast_key.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        Ok(Box::new(InMemorySubscription {
            key: broadcast_key.to_string(),
            receiver,
            channels: Arc::clone(&self.channels),
        }))
    }

    async fn publish(&self, broadcast_key: &str, payload: Bytes) -> ChatResult<()> {
        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(broadcast_key) {
            // Err only means nobody is listening.
            let _ = sender.send(payload);
        }
        Ok(())
    }
}

struct InMemorySubscription {
    key: String,
    receiver: broadcast::Receiver<Bytes>,
    channels: Channels,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> ChatResult<Option<Bytes>> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Ok(Some(payload)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(key = %self.key, skipped, "slow subscriber dropped payloads");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }

    async fn close(self: Box<Self>) {
        let Self { key, receiver, channels } = *self;
        drop(receiver);

        let mut channels = channels.write().await;
        if channels
            .get(&key)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&key);
        }
    }
}
