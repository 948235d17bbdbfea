use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use switchboard_core::types::Classification;

use crate::context::ServiceContext;
use crate::error::ClientError;

/// One call to one service, as seen by a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRequest {
    pub service: String,
    pub intent: String,
    pub parameters: Map<String, Value>,
    /// The user's original command text.
    pub raw_text: String,
}

impl ServiceRequest {
    pub fn new(service: impl Into<String>, intent: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            intent: intent.into(),
            parameters: Map::new(),
            raw_text: raw_text.into(),
        }
    }

    pub fn from_classification(raw_text: &str, c: &Classification) -> Self {
        Self {
            service: c.primary_service.clone(),
            intent: c.intent.clone(),
            parameters: c.parameters.clone(),
            raw_text: raw_text.to_string(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

/// What a client got back from its service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClientResponse {
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: error.clone(),
            data: None,
            error: Some(error),
        }
    }
}

/// A way of reaching external services. Several clients can serve the
/// same service; the dispatcher tries them in order.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Client name for logging.
    fn name(&self) -> &str;

    async fn execute(
        &self,
        request: &ServiceRequest,
        ctx: &ServiceContext,
    ) -> Result<ClientResponse, ClientError>;
}
