//! Chat WebSocket handler

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tuber_chats::{ChatRelay, ParticipantId, RoomKeys};

use super::connection::session_from_socket;
use crate::error::{GatewayError, GatewayResult};
use crate::middleware::bearer_token;
use crate::state::GatewayState;

/// Query parameters accepted on the chat endpoint
#[derive(Debug, Deserialize)]
pub struct ChatSocketQuery {
    pub room: Option<String>,
    pub token: Option<String>,
}

/// Chat WebSocket handler.
///
/// Checks run in order: room, identity, then the upgrade itself. Nothing is
/// read from or written to the log until the connection is upgraded.
pub async fn chat_websocket_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ChatSocketQuery>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> GatewayResult<Response> {
    let room = query.room.unwrap_or_default();
    RoomKeys::new(&room)?;

    let token = bearer_token(&headers).or(query.token.as_deref());
    let participant = state.identity.resolve(token)?;

    let ws = upgrade.map_err(|rejection| GatewayError::Handshake(rejection.body_text()))?;

    debug!(room = %room, participant = %participant, "upgrading chat connection");
    let relay = state.relay.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        serve_chat(relay, room, participant, socket).await;
    }))
}

async fn serve_chat(
    relay: Arc<ChatRelay>,
    room: String,
    participant: ParticipantId,
    socket: WebSocket,
) {
    let session = session_from_socket(socket);

    match relay.handle(&room, participant, session).await {
        Ok(()) => info!(room = %room, participant = %participant, "chat connection finished"),
        Err(error) => warn!(
            room = %room,
            participant = %participant,
            error = %error,
            "chat connection ended with error"
        ),
    }
}
