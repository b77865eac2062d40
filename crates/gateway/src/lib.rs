//! # Tuber Gateway Crate
//!
//! HTTP and WebSocket front door for the chat relay. Resolves the room and the
//! participant for each connection attempt, upgrades it, and hands the socket
//! to [`tuber_chats::ChatRelay`].
//!
//! ## Architecture
//!
//! - **WebSocket**: `GET /ws/chat?room=<room>` upgraded into a relay session
//! - **REST**: health endpoint
//! - **Identity**: JWT verification with an optional anonymous fallback
//! - **Middleware**: CORS, request logging, bearer token extraction
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tuber_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::from_config(&config, services.relay.clone());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod identity;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use identity::{Claims, IdentityResolver};
pub use state::GatewayState;

pub use create_router as build_router;

use axum::{http::Method, middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);
    Router::new()
        .merge(rest::create_rest_routes().with_state(arc_state.clone()))
        .merge(websocket::create_websocket_routes().with_state(arc_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
