//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Handshake(_) => StatusCode::UPGRADE_REQUIRED,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<tuber_chats::ChatError> for GatewayError {
    fn from(error: tuber_chats::ChatError) -> Self {
        match error {
            tuber_chats::ChatError::InvalidRoom => GatewayError::InvalidRequest(error.to_string()),
            tuber_chats::ChatError::Handshake { message } => GatewayError::Handshake(message),
            other => GatewayError::InternalError(other.to_string()),
        }
    }
}
