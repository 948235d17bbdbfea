use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::{json, Value};
use tracing::{info, warn};

use switchboard_core::config::ServicesConfig;
use switchboard_core::services::{ASSISTANT, SERVICES, SYSTEM};
use switchboard_core::types::{Classification, ServiceResult};
use switchboard_services::{
    ClientError, ClientResponse, McpClient, RestClient, ServiceClient, ServiceContext, ServiceRequest,
};

use crate::assistant::SystemClient;
use crate::error::panic_message;
use crate::slash::help_text;

/// One client in a service's try-list.
pub struct ClientSlot {
    pub client: Arc<dyn ServiceClient>,
    /// Extra attempts on the same client before moving on.
    pub max_retries: u32,
}

impl ClientSlot {
    pub fn new(client: Arc<dyn ServiceClient>, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
        }
    }
}

/// Ordered clients for one service: preferred first, legacy after.
pub struct ServiceHandler {
    service: String,
    slots: Vec<ClientSlot>,
}

impl ServiceHandler {
    pub fn new(service: impl Into<String>, slots: Vec<ClientSlot>) -> Self {
        Self {
            service: service.into(),
            slots,
        }
    }

    /// Walk the try-list. A client error moves on to the next client; an
    /// answer, positive or negative, ends the walk.
    pub async fn handle(&self, request: &ServiceRequest, ctx: &ServiceContext) -> ServiceResult {
        let mut last_err: Option<String> = None;

        for slot in &self.slots {
            let client_name = slot.client.name();

            for attempt in 0..=slot.max_retries {
                match slot.client.execute(request, ctx).await {
                    Ok(resp) => {
                        if attempt > 0 || last_err.is_some() {
                            info!(
                                service = %self.service,
                                client = %client_name,
                                attempt,
                                "service call succeeded after fallback"
                            );
                        }
                        return into_result(&self.service, resp);
                    }
                    Err(e) => {
                        warn!(
                            service = %self.service,
                            client = %client_name,
                            attempt,
                            err = %e,
                            "service client failed"
                        );
                        last_err = Some(e.to_string());

                        if attempt < slot.max_retries {
                            tokio::time::sleep(tokio::time::Duration::from_millis(
                                200 * (attempt as u64 + 1),
                            ))
                            .await;
                        }
                    }
                }
            }
        }

        let reason = last_err.unwrap_or_else(|| "no client configured".to_string());
        ServiceResult::failed(&self.service, format!("all clients failed: {reason}"))
    }
}

/// Fold a client answer into the normalized result. The client message is
/// kept as `message` inside the result payload.
fn into_result(service: &str, resp: ClientResponse) -> ServiceResult {
    let mut result = resp.data.unwrap_or(Value::Null);
    if !resp.message.is_empty() {
        match &mut result {
            Value::Object(map) => {
                map.entry("message")
                    .or_insert_with(|| Value::String(resp.message.clone()));
            }
            Value::Null => result = json!({ "message": resp.message }),
            _ => {}
        }
    }

    if resp.success {
        ServiceResult::ok(service, result)
    } else {
        let error = resp
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or(resp.message);
        ServiceResult::failed_with(service, error, result)
    }
}

/// Routes each call to its service handler.
pub struct Dispatcher {
    handlers: HashMap<String, ServiceHandler>,
}

impl Dispatcher {
    /// `assistant` is the conversational fallback for anything without a
    /// registered handler.
    pub fn new(assistant: Arc<dyn ServiceClient>) -> Self {
        let mut handlers = HashMap::new();
        handlers.insert(
            ASSISTANT.to_string(),
            ServiceHandler::new(ASSISTANT, vec![ClientSlot::new(assistant, 0)]),
        );
        handlers.insert(
            SYSTEM.to_string(),
            ServiceHandler::new(SYSTEM, vec![ClientSlot::new(Arc::new(SystemClient), 0)]),
        );
        Self { handlers }
    }

    /// Wire every registered service to the configured clients: the MCP
    /// server first when one is set, then the service's REST bridge.
    /// Services with neither still get a handler so that calls fail with
    /// a clear error instead of reaching the conversational fallback.
    pub fn from_config(assistant: Arc<dyn ServiceClient>, config: &ServicesConfig) -> Result<Self, ClientError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let mcp: Option<Arc<dyn ServiceClient>> = match &config.mcp {
            Some(m) => Some(Arc::new(McpClient::new(m.endpoint.clone(), m.token.clone(), timeout)?)),
            None => None,
        };

        let mut dispatcher = Self::new(assistant);
        for spec in SERVICES {
            let mut slots = Vec::new();
            if let Some(client) = &mcp {
                slots.push(ClientSlot::new(Arc::clone(client), 0));
            }
            if let Some(rest) = config.rest.get(spec.name) {
                let client = RestClient::new(spec.name.to_string(), rest.base_url.clone(), timeout)?;
                slots.push(ClientSlot::new(Arc::new(client), 1));
            }
            info!(service = spec.name, clients = slots.len(), "registered service");
            dispatcher.register(spec.name, slots);
        }
        Ok(dispatcher)
    }

    pub fn register(&mut self, service: &str, slots: Vec<ClientSlot>) {
        self.handlers
            .insert(service.to_string(), ServiceHandler::new(service, slots));
    }

    pub fn has_handler(&self, service: &str) -> bool {
        self.handlers.contains_key(service)
    }

    /// Run the classification's primary service.
    pub async fn dispatch(&self, raw: &str, c: &Classification, ctx: &ServiceContext) -> ServiceResult {
        self.dispatch_request(ServiceRequest::from_classification(raw, c), ctx)
            .await
    }

    /// Run one request. Never fails: errors and panics inside clients come
    /// back as failed results.
    pub async fn dispatch_request(&self, mut request: ServiceRequest, ctx: &ServiceContext) -> ServiceResult {
        if request.intent == "help" && request.service != ASSISTANT && request.service != SYSTEM {
            let mut text = help_text(&request.service);
            if let Some(cmd) = request.parameters.get("command").and_then(|v| v.as_str()) {
                text = format!("Unknown command \"{cmd}\".\n{text}");
            }
            return ServiceResult::ok(&request.service, json!({ "message": text }));
        }

        if !self.handlers.contains_key(&request.service) {
            info!(service = %request.service, "no handler, using conversational fallback");
            request.service = ASSISTANT.to_string();
        }
        let service = request.service.clone();
        let Some(handler) = self.handlers.get(&service) else {
            return ServiceResult::failed(service, "no handler registered");
        };

        match AssertUnwindSafe(handler.handle(&request, ctx))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                warn!(service = %service, panic = %msg, "service client panicked");
                ServiceResult::failed(service, format!("internal error: {msg}"))
            }
        }
    }
}
