//! Preferred service client: one MCP server exposing a tool per
//! `<service>_<intent>`.
//!
//! Protocol: JSON-RPC 2.0 `tools/call` over HTTP POST.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::{ClientResponse, ServiceClient, ServiceRequest};
use crate::context::ServiceContext;
use crate::error::ClientError;

pub struct McpClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(endpoint: String, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            token,
            next_id: AtomicU64::new(1),
        })
    }

    fn build_call(&self, request: &ServiceRequest, credentials: &Value) -> Value {
        let mut arguments = request.parameters.clone();
        arguments.insert("text".into(), Value::String(request.raw_text.clone()));
        arguments.insert("credentials".into(), credentials.clone());

        json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "tools/call",
            "params": {
                "name": tool_name(request),
                "arguments": arguments,
            }
        })
    }
}

pub fn tool_name(request: &ServiceRequest) -> String {
    format!("{}_{}", request.service, request.intent)
}

#[async_trait]
impl ServiceClient for McpClient {
    fn name(&self) -> &str {
        "mcp"
    }

    async fn execute(
        &self,
        request: &ServiceRequest,
        ctx: &ServiceContext,
    ) -> Result<ClientResponse, ClientError> {
        let credentials = ctx.require(&request.service)?;
        let body = self.build_call(request, credentials);

        debug!(tool = %tool_name(request), "calling MCP tool");

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send().await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "MCP server error");
            return Err(ClientError::Status { status, body: text });
        }

        let envelope: Value = resp.json().await?;
        parse_envelope(envelope)
    }
}

/// Interpret a JSON-RPC response to `tools/call`.
///
/// Transport-level `error` objects are client errors (try the next client);
/// a tool result flagged `isError` is the service's own negative answer.
pub fn parse_envelope(envelope: Value) -> Result<ClientResponse, ClientError> {
    if let Some(err) = envelope.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown JSON-RPC error");
        return Err(ClientError::Protocol(msg.to_string()));
    }

    let result = envelope
        .get("result")
        .ok_or_else(|| ClientError::Protocol("response has neither result nor error".into()))?;

    let text: String = result
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if result.get("isError").and_then(|v| v.as_bool()).unwrap_or(false) {
        return Ok(ClientResponse::failed(text));
    }

    // Structured output wins; otherwise tools usually return JSON as text.
    let data = result
        .get("structuredContent")
        .cloned()
        .or_else(|| serde_json::from_str::<Value>(&text).ok());

    let message = match &data {
        Some(d) => d
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_default(),
        None => text,
    };
    Ok(ClientResponse::ok(message, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use switchboard_store::ServiceConnection;

    #[test]
    fn rpc_error_is_client_error() {
        let env = json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32601, "message": "Method not found" } });
        assert!(matches!(parse_envelope(env), Err(ClientError::Protocol(m)) if m == "Method not found"));
    }

    #[test]
    fn tool_error_is_negative_answer() {
        let env = json!({ "result": { "content": [{ "type": "text", "text": "shop suspended" }], "isError": true } });
        let r = parse_envelope(env).unwrap();
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("shop suspended"));
    }

    #[test]
    fn json_text_becomes_data() {
        let env = json!({ "result": { "content": [{ "type": "text", "text": "{\"orders\":[1,2],\"message\":\"2 orders\"}" }] } });
        let r = parse_envelope(env).unwrap();
        assert!(r.success);
        assert_eq!(r.message, "2 orders");
        assert_eq!(r.data.unwrap()["orders"], json!([1, 2]));
    }

    #[test]
    fn plain_text_is_message() {
        let env = json!({ "result": { "content": [{ "type": "text", "text": "Posted." }] } });
        let r = parse_envelope(env).unwrap();
        assert_eq!(r.message, "Posted.");
        assert!(r.data.is_none());
    }

    async fn spawn_server() -> String {
        async fn handle(Json(body): Json<Value>) -> Json<Value> {
            let name = body["params"]["name"].as_str().unwrap_or_default().to_string();
            let shop = body["params"]["arguments"]["credentials"]["shop"].clone();
            let text = json!({ "tool": name, "shop": shop }).to_string();
            Json(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": { "content": [{ "type": "text", "text": text }] }
            }))
        }
        let app = Router::new().route("/mcp", post(handle));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/mcp")
    }

    #[tokio::test]
    async fn calls_service_intent_tool_with_credentials() {
        let endpoint = spawn_server().await;
        let client = McpClient::new(endpoint, None, Duration::from_secs(5)).unwrap();
        let ctx = ServiceContext::new().with_connection(ServiceConnection::new(
            "shopify",
            true,
            json!({ "shop": "demo.myshopify.com" }),
        ));
        let req = ServiceRequest::new("shopify", "get_sales", "/shopify sales");
        let r = client.execute(&req, &ctx).await.unwrap();
        let data = r.data.unwrap();
        assert_eq!(data["tool"], "shopify_get_sales");
        assert_eq!(data["shop"], "demo.myshopify.com");
    }

    #[tokio::test]
    async fn disconnected_service_fails_before_network() {
        let client = McpClient::new("http://127.0.0.1:9/unused".into(), None, Duration::from_secs(1)).unwrap();
        let req = ServiceRequest::new("slack", "send_message", "x");
        let err = client.execute(&req, &ServiceContext::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected { .. }));
    }
}
