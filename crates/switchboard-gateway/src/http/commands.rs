//! POST /commands: run one chat command through the pipeline.
//!
//! Request:  `{"command": "/shopify sales today"}`
//! Response: `{"commandId": "...", "messageId": "...", "status": "completed", "content": "..."}`
//!
//! The call returns once the reply is persisted. Progress lines are pushed
//! to WS clients while it runs, followed by one `command.completed` event.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use switchboard_engine::ProcessedCommand;

use crate::app::AppState;
use crate::auth;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

pub async fn submit_command(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CommandRequest>,
) -> Result<Json<ProcessedCommand>, ApiError> {
    auth::check(&state, &headers)?;

    let processed = state.processor.process(&req.command).await?;
    info!(
        command_id = %processed.command_id,
        status = %processed.status,
        "POST /commands done"
    );
    state.broadcaster.emit(
        "command.completed",
        json!({
            "commandId": processed.command_id,
            "messageId": processed.message_id,
            "status": processed.status,
            "content": processed.content,
        }),
    );
    Ok(Json(processed))
}
