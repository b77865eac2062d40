//! Connection sessions: one live duplex connection to one participant.
//!
//! A transport hands the relay a [`Session`] made of a [`FrameReader`] and a
//! [`FrameWriter`]. The two halves are driven by different loops, so they are
//! separate values rather than one object behind a lock.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use tracing::debug;

use crate::types::ChatResult;

/// Inbound half of a connection.
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Next application frame. Clean peer closure is reported as
    /// [`crate::ChatError::ConnectionClosed`].
    ///
    /// Must be cancel-safe: the relay races it against shutdown.
    async fn read_frame(&mut self) -> ChatResult<Bytes>;
}

/// Outbound half of a connection.
#[async_trait]
pub trait FrameWriter: Send {
    async fn write_frame(&mut self, frame: Bytes) -> ChatResult<()>;

    /// Close the connection. Called exactly once by the relay.
    async fn close(&mut self) -> ChatResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    ReplayingHistory,
    Active,
    Closing,
    Closed,
}

pub type SessionStateWatch = watch::Receiver<SessionState>;

/// An upgraded connection waiting to be handed to the relay.
pub struct Session<R, W> {
    reader: R,
    writer: W,
    state: watch::Sender<SessionState>,
}

impl<R: FrameReader, W: FrameWriter> Session<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self { reader, writer, state }
    }

    /// Observe the lifecycle of this session from outside the relay.
    pub fn watch_state(&self) -> SessionStateWatch {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn into_parts(self) -> (R, W, Lifecycle) {
        (
            self.reader,
            self.writer,
            Lifecycle {
                state: self.state,
                closed: false,
            },
        )
    }
}

/// Single owner of the close operation for one session.
pub(crate) struct Lifecycle {
    state: watch::Sender<SessionState>,
    closed: bool,
}

impl Lifecycle {
    pub(crate) fn transition(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        debug!(?previous, ?next, "session state changed");
    }

    /// Close the connection once; later calls are no-ops.
    pub(crate) async fn close<W: FrameWriter>(&mut self, writer: &mut W) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.transition(SessionState::Closing);
        if let Err(error) = writer.close().await {
            debug!(%error, "connection close reported an error");
        }
        self.transition(SessionState::Closed);
    }

    /// Release a session that never performed I/O.
    pub(crate) fn abandon(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.transition(SessionState::Closing);
        self.transition(SessionState::Closed);
    }
}

impl Drop for Lifecycle {
    /// A cancelled session still reports `Closed`; the connection halves are
    /// released by being dropped alongside.
    fn drop(&mut self) {
        self.abandon();
    }
}
