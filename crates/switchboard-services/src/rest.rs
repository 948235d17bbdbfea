//! Legacy service client: one REST bridge per service, one POST per intent.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::{ClientResponse, ServiceClient, ServiceRequest};
use crate::context::ServiceContext;
use crate::error::ClientError;

pub struct RestClient {
    client: reqwest::Client,
    service: String,
    base_url: String,
}

impl RestClient {
    pub fn new(service: String, base_url: String, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ServiceClient for RestClient {
    fn name(&self) -> &str {
        "rest"
    }

    async fn execute(
        &self,
        request: &ServiceRequest,
        ctx: &ServiceContext,
    ) -> Result<ClientResponse, ClientError> {
        if request.service != self.service {
            return Err(ClientError::NotConfigured {
                service: request.service.clone(),
            });
        }
        ctx.require(&request.service)?;

        let url = format!("{}/{}", self.base_url, request.intent);
        let body = json!({
            "parameters": request.parameters,
            "text": request.raw_text,
        });

        debug!(service = %self.service, %url, "calling REST bridge");

        let mut builder = self.client.post(&url).json(&body);
        if let Some(token) = ctx.bearer_token(&request.service) {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send().await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(service = %self.service, status, body = %text, "REST bridge error");
            return Err(ClientError::Status { status, body: text });
        }

        let value: Value = resp.json().await?;
        Ok(parse_body(value))
    }
}

/// Bridges either answer in the `{success, message, data, error}` shape or
/// return the raw payload; the latter counts as success.
pub fn parse_body(value: Value) -> ClientResponse {
    if value.get("success").and_then(|s| s.as_bool()).is_some() {
        if let Ok(r) = serde_json::from_value::<ClientResponse>(value.clone()) {
            return r;
        }
    }
    ClientResponse::ok(String::new(), Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::HeaderMap, routing::post, Json, Router};
    use switchboard_store::ServiceConnection;

    #[test]
    fn envelope_shape_is_respected() {
        let r = parse_body(json!({ "success": false, "message": "no scope", "error": "403" }));
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("403"));
    }

    #[test]
    fn raw_payload_is_success() {
        let r = parse_body(json!({ "orders": [] }));
        assert!(r.success);
        assert_eq!(r.data.unwrap()["orders"], json!([]));
    }

    #[tokio::test]
    async fn posts_intent_with_bearer_token() {
        async fn handle(
            Path(intent): Path<String>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Json(json!({
                "success": true,
                "message": format!("{intent} ok"),
                "data": { "auth": auth, "limit": body["parameters"]["limit"] }
            }))
        }
        let app = Router::new().route("/api/{intent}", post(handle));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = RestClient::new(
            "klaviyo".into(),
            format!("http://{addr}/api/"),
            Duration::from_secs(5),
        )
        .unwrap();
        let ctx = ServiceContext::new().with_connection(ServiceConnection::new(
            "klaviyo",
            true,
            json!({ "api_key": "pk_live" }),
        ));
        let req = ServiceRequest::new("klaviyo", "get_profiles", "/klaviyo profiles").with_param("limit", 5);
        let r = client.execute(&req, &ctx).await.unwrap();
        assert!(r.success);
        assert_eq!(r.message, "get_profiles ok");
        let data = r.data.unwrap();
        assert_eq!(data["auth"], "Bearer pk_live");
        assert_eq!(data["limit"], 5);
    }
}
