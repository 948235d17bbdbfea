use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use switchboard_core::error::SwitchboardError;
use switchboard_engine::EngineError;
use switchboard_store::StoreError;

/// Error body for every HTTP route: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug)]
pub struct ApiError(pub SwitchboardError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SwitchboardError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            SwitchboardError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
            SwitchboardError::UnknownService(_) => StatusCode::NOT_FOUND,
            SwitchboardError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            SwitchboardError::LlmProvider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SwitchboardError> for ApiError {
    fn from(e: SwitchboardError) -> Self {
        Self(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(SwitchboardError::Database(e.to_string()))
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(match e {
            EngineError::InvalidCommand(m) => SwitchboardError::InvalidCommand(m),
            EngineError::PayloadTooLarge { size, max } => SwitchboardError::PayloadTooLarge { size, max },
            EngineError::Store(e) => SwitchboardError::Database(e.to_string()),
            EngineError::Provider(e) => SwitchboardError::LlmProvider(e.to_string()),
            EngineError::Panicked(m) => SwitchboardError::Internal(m),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(code = self.0.code(), error = %self.0, "request failed");
        }
        let body = json!({
            "error": {
                "code": self.0.code(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
