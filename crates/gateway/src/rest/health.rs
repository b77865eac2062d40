use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub anonymous_access: bool,
    pub timestamp: String,
}

pub async fn health_check(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        anonymous_access: state.identity.allows_anonymous(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
