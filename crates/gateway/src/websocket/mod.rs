//! WebSocket endpoints for the gateway

pub mod chat;
pub mod connection;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::GatewayState;

/// Create all WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws/chat", get(chat::chat_websocket_handler))
}

pub use chat::{chat_websocket_handler, ChatSocketQuery};
pub use connection::{session_from_socket, WsFrameReader, WsFrameWriter, WsSession};
