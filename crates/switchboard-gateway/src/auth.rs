use axum::http::HeaderMap;

use switchboard_core::error::SwitchboardError;

use crate::app::AppState;
use crate::error::ApiError;

/// Enforce `gateway.token` when one is configured.
pub fn check(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    check_token(state, extract_bearer(headers))
}

/// Same check for clients that cannot set headers (browser WebSockets
/// pass `?token=`).
pub fn check_token(state: &AppState, presented: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = state.config.gateway.token.as_deref() else {
        return Ok(());
    };
    if presented == Some(expected) {
        Ok(())
    } else {
        Err(ApiError(SwitchboardError::AuthFailed(
            "set 'Authorization: Bearer <token>'".into(),
        )))
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
