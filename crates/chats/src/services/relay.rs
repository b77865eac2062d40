//! The chat relay: bridges one connection session with the shared room log
//! and room broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::broadcast::{RoomBroadcast, Subscription};
use crate::entities::{ChatEvent, ParticipantId, RoomKeys};
use crate::repositories::RoomLog;
use crate::session::{FrameReader, FrameWriter, Session, SessionState};
use crate::types::{ChatError, ChatResult};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Runs chat sessions against an injected room log and broadcast channel.
///
/// Cheap to share: clone the `Arc` handles or wrap the relay itself in an
/// `Arc`. Nothing is held across I/O besides the session's own halves.
#[derive(Clone)]
pub struct ChatRelay {
    log: Arc<dyn RoomLog>,
    broadcast: Arc<dyn RoomBroadcast>,
    shutdown_grace: Duration,
}

impl ChatRelay {
    pub fn new(log: Arc<dyn RoomLog>, broadcast: Arc<dyn RoomBroadcast>) -> Self {
        Self {
            log,
            broadcast,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// How long to wait for the ingest loop to finish an in-flight frame after
    /// the session starts shutting down. The loop is aborted afterwards.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn log(&self) -> &Arc<dyn RoomLog> {
        &self.log
    }

    pub fn broadcast(&self) -> &Arc<dyn RoomBroadcast> {
        &self.broadcast
    }

    /// Serve `session` as `participant` in `room` until the connection ends.
    ///
    /// Replays the room's history, subscribes to the room, then runs the ingest
    /// loop (connection to log and broadcast) beside the delivery loop
    /// (broadcast to connection). The first loop to end shuts the other down.
    /// Returns `Ok(())` on clean peer closure, otherwise the first terminal
    /// error.
    pub async fn handle<R, W>(
        &self,
        room: &str,
        participant: ParticipantId,
        session: Session<R, W>,
    ) -> ChatResult<()>
    where
        R: FrameReader,
        W: FrameWriter,
    {
        let (reader, mut writer, mut lifecycle) = session.into_parts();

        let keys = match RoomKeys::new(room) {
            Ok(keys) => keys,
            Err(error) => {
                lifecycle.abandon();
                return Err(error);
            }
        };

        info!(room, %participant, "chat session started");

        lifecycle.transition(SessionState::ReplayingHistory);
        match self.replay_history(&keys, &mut writer).await {
            Ok(replayed) => debug!(room, replayed, "history replayed"),
            Err(error) => {
                warn!(room, %participant, %error, "history replay failed");
                lifecycle.close(&mut writer).await;
                return Err(error);
            }
        }

        let mut subscription = match self.broadcast.subscribe(keys.broadcast_key()).await {
            Ok(subscription) => subscription,
            Err(error) => {
                warn!(room, %participant, %error, "room subscription failed");
                lifecycle.close(&mut writer).await;
                return Err(error);
            }
        };

        lifecycle.transition(SessionState::Active);

        let shutdown = CancellationToken::new();
        // Dropping `handle` mid-session must still stop ingest.
        let _cancel_on_drop = shutdown.clone().drop_guard();
        let mut ingest = IngestTask(tokio::spawn(ingest_loop(
            reader,
            Arc::clone(&self.log),
            Arc::clone(&self.broadcast),
            keys.clone(),
            participant,
            shutdown.clone(),
        )));

        let mut ingest_joined = false;
        let outcome = tokio::select! {
            joined = &mut ingest.0 => {
                ingest_joined = true;
                flatten_join(joined)
            }
            delivered = delivery_loop(&mut writer, subscription.as_mut()) => delivered,
        };

        shutdown.cancel();
        if !ingest_joined {
            match tokio::time::timeout(self.shutdown_grace, &mut ingest.0).await {
                Ok(joined) => {
                    if let Err(error) = flatten_join(joined) {
                        debug!(room, %error, "ingest loop ended after shutdown");
                    }
                }
                Err(_) => {
                    warn!(room, "ingest loop did not stop in time, aborting");
                    ingest.0.abort();
                }
            }
        }

        subscription.close().await;
        lifecycle.close(&mut writer).await;

        match outcome {
            Ok(()) | Err(ChatError::ConnectionClosed) => {
                info!(room, %participant, "chat session ended");
                Ok(())
            }
            Err(error) => {
                warn!(room, %participant, %error, "chat session failed");
                Err(error)
            }
        }
    }

    /// All-or-nothing: any failure aborts the session rather than leaving
    /// the participant with a partial history.
    async fn replay_history<W: FrameWriter>(
        &self,
        keys: &RoomKeys,
        writer: &mut W,
    ) -> ChatResult<usize> {
        let events = self.log.read_all(keys.log_key()).await.map_err(|error| match error {
            ChatError::HistoryReplay { .. } => error,
            other => ChatError::history_replay(other.to_string()),
        })?;

        for event in &events {
            writer
                .write_frame(event.payload.clone())
                .await
                .map_err(|error| ChatError::history_replay(format!("writing history: {error}")))?;
        }

        Ok(events.len())
    }
}

/// Owns the spawned ingest loop and aborts it when dropped.
struct IngestTask(JoinHandle<ChatResult<()>>);

impl Drop for IngestTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Connection to log and broadcast. Frames are handled strictly in arrival
/// order and every payload is appended before it is published.
async fn ingest_loop<R: FrameReader>(
    mut reader: R,
    log: Arc<dyn RoomLog>,
    broadcast: Arc<dyn RoomBroadcast>,
    keys: RoomKeys,
    participant: ParticipantId,
    shutdown: CancellationToken,
) -> ChatResult<()> {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            frame = reader.read_frame() => frame?,
        };

        let event = ChatEvent::new(participant, keys.room(), frame);
        let position = log.append(keys.log_key(), &event).await?;
        trace!(room = keys.room(), %position, "chat event appended");

        broadcast.publish(keys.broadcast_key(), event.payload).await?;
    }
}

/// Broadcast to connection, verbatim. The sender's own payloads come back
/// here too.
async fn delivery_loop<W: FrameWriter>(
    writer: &mut W,
    subscription: &mut dyn Subscription,
) -> ChatResult<()> {
    while let Some(payload) = subscription.next().await? {
        writer.write_frame(payload).await?;
    }
    Ok(())
}

fn flatten_join(joined: Result<ChatResult<()>, tokio::task::JoinError>) -> ChatResult<()> {
    joined.unwrap_or_else(|error| Err(ChatError::transport(format!("ingest task failed: {error}"))))
}
