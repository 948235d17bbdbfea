//! Built-in clients for the two pseudo-services.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use switchboard_agent::AgentRuntime;
use switchboard_services::{ClientError, ClientResponse, ServiceClient, ServiceContext, ServiceRequest};

/// Conversational fallback: answers with the general-purpose model.
pub struct AssistantClient {
    runtime: Arc<AgentRuntime>,
}

impl AssistantClient {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl ServiceClient for AssistantClient {
    fn name(&self) -> &str {
        "assistant"
    }

    async fn execute(
        &self,
        request: &ServiceRequest,
        _ctx: &ServiceContext,
    ) -> Result<ClientResponse, ClientError> {
        let prompt = request
            .parameters
            .get("query")
            .and_then(|q| q.as_str())
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(&request.raw_text);
        let resp = self
            .runtime
            .chat(prompt)
            .await
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;
        Ok(ClientResponse::ok(resp.content, None))
    }
}

/// Answers for classifier fallbacks routed to `system`.
pub struct SystemClient;

#[async_trait]
impl ServiceClient for SystemClient {
    fn name(&self) -> &str {
        "system"
    }

    async fn execute(
        &self,
        request: &ServiceRequest,
        _ctx: &ServiceContext,
    ) -> Result<ClientResponse, ClientError> {
        let param = |k: &str| {
            request
                .parameters
                .get(k)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Ok(match request.intent.as_str() {
            "error" => ClientResponse::failed(format!(
                "I couldn't work out what to do with that command right now ({}). Try a slash command like /shopify sales today.",
                param("error")
            )),
            "echo" => ClientResponse::ok(
                format!(
                    "I wasn't sure which service \"{}\" is for. Try naming the service or use /<service> help.",
                    param("text")
                ),
                Some(json!({ "text": param("text") })),
            ),
            other => ClientResponse::failed(format!("unsupported system intent: {other}")),
        })
    }
}
