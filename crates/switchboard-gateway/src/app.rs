use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use dashmap::DashMap;
use tower_http::cors::CorsLayer;

use switchboard_agent::AgentRuntime;
use switchboard_core::config::SwitchboardConfig;
use switchboard_engine::{CommandProcessor, Dispatcher};
use switchboard_store::CommandStore;

use crate::ws::broadcast::{BroadcastReporter, EventBroadcaster};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: SwitchboardConfig,
    pub store: Arc<dyn CommandStore>,
    pub runtime: Arc<AgentRuntime>,
    pub processor: CommandProcessor,
    pub broadcaster: EventBroadcaster,
    /// Active WS connections: conn_id -> connected-at timestamp.
    pub ws_clients: DashMap<String, String>,
}

impl AppState {
    pub fn new(
        config: SwitchboardConfig,
        store: Arc<dyn CommandStore>,
        runtime: Arc<AgentRuntime>,
        dispatcher: Dispatcher,
    ) -> Self {
        let broadcaster = EventBroadcaster::new();
        let processor = CommandProcessor::new(
            Arc::clone(&store),
            Arc::clone(&runtime),
            dispatcher,
            &config,
        )
        .with_reporter(Arc::new(BroadcastReporter::new(broadcaster.clone())));
        Self {
            config,
            store,
            runtime,
            processor,
            broadcaster,
            ws_clients: DashMap::new(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/commands", post(crate::http::commands::submit_command))
        .route("/messages", get(crate::http::messages::list_messages))
        .route("/connections", get(crate::http::connections::list_connections))
        .route(
            "/connections/{service}",
            put(crate::http::connections::put_connection),
        )
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use switchboard_agent::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
    use switchboard_engine::AssistantClient;
    use switchboard_store::SqliteStore;
    use tower::ServiceExt;

    /// Answers every prompt with the same line.
    struct Canned;

    #[async_trait]
    impl LlmProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "Hi! How can I help?".into(),
                model: req.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
                stop_reason: "end_turn".into(),
            })
        }
    }

    pub(crate) fn state_with(config: SwitchboardConfig) -> Arc<AppState> {
        let store: Arc<dyn CommandStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let runtime = Arc::new(AgentRuntime::new(
            Box::new(Canned),
            "main".into(),
            "router".into(),
        ));
        let dispatcher = Dispatcher::new(Arc::new(AssistantClient::new(Arc::clone(&runtime))));
        Arc::new(AppState::new(config, store, runtime, dispatcher))
    }

    pub(crate) async fn call(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = build_router(Arc::clone(state)).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub(crate) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let state = state_with(SwitchboardConfig::default());
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["ws_clients"], 0);
    }

    #[tokio::test]
    async fn command_round_trip_and_history() {
        let state = state_with(SwitchboardConfig::default());
        let mut events = state.broadcaster.subscribe();

        let (status, body) = call(
            &state,
            json_request("POST", "/commands", json!({ "command": "hello there" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["content"], "Hi! How can I help?");
        assert_eq!(body["directResponse"], true);
        assert!(body["commandId"].is_string());

        // progress first, completion last
        let mut last = Value::Null;
        while let Ok(text) = events.try_recv() {
            last = serde_json::from_str(&text).unwrap();
        }
        assert_eq!(last["event"], "command.completed");
        assert_eq!(last["payload"]["messageId"], body["messageId"]);

        let req = Request::get("/messages?limit=10").body(Body::empty()).unwrap();
        let (status, body) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["metadata"]["directResponse"], true);
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let state = state_with(SwitchboardConfig::default());
        let (status, body) = call(
            &state,
            json_request("POST", "/commands", json!({ "command": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_COMMAND");
    }

    #[tokio::test]
    async fn token_is_enforced_when_configured() {
        let mut config = SwitchboardConfig::default();
        config.gateway.token = Some("s3cret".into());
        let state = state_with(config);

        let (status, body) = call(
            &state,
            json_request("POST", "/commands", json!({ "command": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH_FAILED");

        let mut req = json_request("POST", "/commands", json!({ "command": "hi" }));
        req.headers_mut()
            .insert("authorization", "Bearer s3cret".parse().unwrap());
        let (status, _) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
    }
}
