use std::collections::HashMap;

use serde_json::Value;

use switchboard_store::ServiceConnection;

use crate::error::ClientError;

/// Credential fields tried, in order, when a client needs a bearer token.
const TOKEN_FIELDS: &[&str] = &["access_token", "api_key", "token", "apiKey", "accessToken"];

/// Connection snapshot for one command, resolved once from the store
/// before dispatch and shared read-only by every client call.
#[derive(Debug, Clone, Default)]
pub struct ServiceContext {
    connections: HashMap<String, ServiceConnection>,
}

impl ServiceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_connections(connections: impl IntoIterator<Item = ServiceConnection>) -> Self {
        Self {
            connections: connections
                .into_iter()
                .map(|c| (c.service_type.clone(), c))
                .collect(),
        }
    }

    pub fn with_connection(mut self, connection: ServiceConnection) -> Self {
        self.connections
            .insert(connection.service_type.clone(), connection);
        self
    }

    pub fn connection(&self, service: &str) -> Option<&ServiceConnection> {
        self.connections.get(service)
    }

    pub fn is_connected(&self, service: &str) -> bool {
        self.connection(service).is_some_and(|c| c.is_connected)
    }

    /// Credentials of a connected service, or `NotConnected`.
    pub fn require(&self, service: &str) -> Result<&Value, ClientError> {
        match self.connection(service) {
            Some(c) if c.is_connected => Ok(&c.credentials),
            _ => Err(ClientError::NotConnected {
                service: service.to_string(),
            }),
        }
    }

    pub fn credential(&self, service: &str, key: &str) -> Option<&str> {
        self.connection(service)?.credentials.get(key)?.as_str()
    }

    /// First token-like credential of a service.
    pub fn bearer_token(&self, service: &str) -> Option<&str> {
        TOKEN_FIELDS
            .iter()
            .find_map(|k| self.credential(service, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_rejects_disconnected_and_missing() {
        let ctx = ServiceContext::from_connections(vec![
            ServiceConnection::new("shopify", true, json!({ "access_token": "a" })),
            ServiceConnection::new("slack", false, json!({ "token": "b" })),
        ]);
        assert!(ctx.require("shopify").is_ok());
        assert!(matches!(ctx.require("slack"), Err(ClientError::NotConnected { .. })));
        assert!(matches!(ctx.require("notion"), Err(ClientError::NotConnected { .. })));
    }

    #[test]
    fn bearer_token_checks_known_fields() {
        let ctx = ServiceContext::new()
            .with_connection(ServiceConnection::new("klaviyo", true, json!({ "api_key": "pk_1" })));
        assert_eq!(ctx.bearer_token("klaviyo"), Some("pk_1"));
        assert_eq!(ctx.bearer_token("shopify"), None);
    }
}
