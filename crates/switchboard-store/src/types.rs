use serde::{Deserialize, Serialize};
use serde_json::Value;

use switchboard_core::types::{CommandId, CommandStatus, MessageId, MessageRole};

/// Stored connection state for one external service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConnection {
    pub service_type: String,
    pub is_connected: bool,
    /// Opaque credential blob (API keys, OAuth tokens, shop domain...).
    #[serde(default)]
    pub credentials: Value,
}

impl ServiceConnection {
    pub fn new(service_type: impl Into<String>, is_connected: bool, credentials: Value) -> Self {
        Self {
            service_type: service_type.into(),
            is_connected,
            credentials,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Delivered,
    Failed,
}

/// Client-facing flags attached to a chat message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageMetadata {
    pub is_processing: bool,
    pub delivery_status: DeliveryStatus,
    pub completed: bool,
    /// Progress lines reported while the command ran.
    pub steps: Vec<String>,
    /// Answered without classification or service dispatch.
    pub direct_response: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
}

impl MessageMetadata {
    /// Metadata for an assistant reply that is still being produced.
    pub fn pending(command_id: &CommandId) -> Self {
        Self {
            is_processing: true,
            command_id: Some(command_id.to_string()),
            ..Self::default()
        }
    }

    /// Mark as finished. `delivered` is false when the command failed.
    pub fn finish(mut self, delivered: bool) -> Self {
        self.is_processing = false;
        self.completed = true;
        self.delivery_status = if delivered {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Failed
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub metadata: MessageMetadata,
    pub created_at: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>, metadata: MessageMetadata) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            metadata,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Audit row for one processed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandHistoryEntry {
    pub id: CommandId,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub status: CommandStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
}

impl CommandHistoryEntry {
    /// Fresh entry in the `processing` state.
    pub fn processing(command: impl Into<String>) -> Self {
        Self {
            id: CommandId::new(),
            command: command.into(),
            result: None,
            status: CommandStatus::Processing,
            created_at: chrono::Utc::now().to_rfc3339(),
            processed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serializes_camel_case() {
        let id = CommandId::from("c-1");
        let json = serde_json::to_value(MessageMetadata::pending(&id)).unwrap();
        assert_eq!(json["isProcessing"], true);
        assert_eq!(json["deliveryStatus"], "pending");
        assert_eq!(json["commandId"], "c-1");
        assert_eq!(json["directResponse"], false);
    }

    #[test]
    fn metadata_tolerates_missing_fields() {
        let m: MessageMetadata = serde_json::from_str(r#"{"steps":["a"]}"#).unwrap();
        assert_eq!(m.steps, vec!["a"]);
        assert!(!m.completed);
    }

    #[test]
    fn finish_sets_delivery() {
        let m = MessageMetadata::default().finish(false);
        assert!(m.completed);
        assert!(!m.is_processing);
        assert_eq!(m.delivery_status, DeliveryStatus::Failed);
    }
}
