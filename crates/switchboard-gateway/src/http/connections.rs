use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use switchboard_core::error::SwitchboardError;
use switchboard_core::services::find_service;
use switchboard_store::ServiceConnection;

use crate::app::AppState;
use crate::auth;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub is_connected: bool,
    #[serde(default)]
    pub credentials: Value,
}

/// PUT /connections/{service}: store or replace a service's credentials.
/// Accepts any alias; the row is keyed by the canonical name.
pub async fn put_connection(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(service): Path<String>,
    Json(req): Json<ConnectionRequest>,
) -> Result<Json<Value>, ApiError> {
    auth::check(&state, &headers)?;
    let spec = find_service(&service).ok_or(SwitchboardError::UnknownService(service))?;

    let connection = ServiceConnection::new(spec.name, req.is_connected, req.credentials);
    state.store.upsert_connection(&connection)?;
    info!(service = spec.name, connected = req.is_connected, "connection updated");

    Ok(Json(json!({
        "serviceType": spec.name,
        "isConnected": req.is_connected,
    })))
}

/// GET /connections: connection flags per service, without credentials.
pub async fn list_connections(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    auth::check(&state, &headers)?;
    let connections: Vec<Value> = state
        .store
        .list_connections()?
        .into_iter()
        .map(|c| json!({ "serviceType": c.service_type, "isConnected": c.is_connected }))
        .collect();
    Ok(Json(json!({ "connections": connections })))
}
