//! REST endpoints for the gateway

pub mod health;

use axum::{routing::get, Router};
use crate::state::GatewayState;
use std::sync::Arc;

/// Create all REST routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/health", get(health::health_check))
}

pub use health::{health_check, HealthResponse};
