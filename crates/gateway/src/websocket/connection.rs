//! Adapts an upgraded axum WebSocket to the relay's reader/writer halves.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tracing::trace;
use tuber_chats::{ChatError, ChatResult, FrameReader, FrameWriter, Session};

/// Inbound half: yields text and binary payloads, skips control frames.
pub struct WsFrameReader {
    receiver: SplitStream<WebSocket>,
}

/// Outbound half: UTF-8 payloads go out as text frames, anything else as binary.
pub struct WsFrameWriter {
    sender: SplitSink<WebSocket, Message>,
}

pub type WsSession = Session<WsFrameReader, WsFrameWriter>;

/// Split `socket` into a relay session.
pub fn session_from_socket(socket: WebSocket) -> WsSession {
    let (sender, receiver) = socket.split();
    Session::new(WsFrameReader { receiver }, WsFrameWriter { sender })
}

#[async_trait]
impl FrameReader for WsFrameReader {
    async fn read_frame(&mut self) -> ChatResult<Bytes> {
        loop {
            let message = match self.receiver.next().await {
                Some(Ok(message)) => message,
                Some(Err(err)) => return Err(ChatError::transport(err.to_string())),
                None => return Err(ChatError::ConnectionClosed),
            };

            match message {
                Message::Text(text) => return Ok(Bytes::from(text)),
                Message::Binary(data) => return Ok(Bytes::from(data)),
                Message::Ping(_) | Message::Pong(_) => {
                    trace!("skipping control frame");
                }
                Message::Close(_) => return Err(ChatError::ConnectionClosed),
            }
        }
    }
}

#[async_trait]
impl FrameWriter for WsFrameWriter {
    async fn write_frame(&mut self, frame: Bytes) -> ChatResult<()> {
        let message = match String::from_utf8(frame.to_vec()) {
            Ok(text) => Message::Text(text),
            Err(err) => Message::Binary(err.into_bytes()),
        };

        self.sender
            .send(message)
            .await
            .map_err(|err| ChatError::transport(err.to_string()))
    }

    async fn close(&mut self) -> ChatResult<()> {
        self.sender
            .close()
            .await
            .map_err(|err| ChatError::transport(err.to_string()))
    }
}
