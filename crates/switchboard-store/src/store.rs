use serde_json::Value;

use switchboard_core::types::{CommandId, CommandStatus, MessageId};

use crate::error::Result;
use crate::types::{ChatMessage, CommandHistoryEntry, MessageMetadata, ServiceConnection};

/// Persistence seam used by the command pipeline and the gateway.
///
/// Calls are synchronous and short; implementations serialize access
/// internally.
pub trait CommandStore: Send + Sync {
    fn get_connection_by_type(&self, service_type: &str) -> Result<Option<ServiceConnection>>;

    /// All stored connections, used to build a per-request service context.
    fn list_connections(&self) -> Result<Vec<ServiceConnection>>;

    fn upsert_connection(&self, connection: &ServiceConnection) -> Result<()>;

    fn create_chat_message(&self, message: &ChatMessage) -> Result<()>;

    /// Replace the content and metadata of an existing message.
    fn update_chat_message(
        &self,
        id: &MessageId,
        content: &str,
        metadata: &MessageMetadata,
    ) -> Result<()>;

    fn get_chat_message(&self, id: &MessageId) -> Result<Option<ChatMessage>>;

    /// The `limit` most recent messages, oldest first.
    fn list_chat_messages(&self, limit: usize) -> Result<Vec<ChatMessage>>;

    fn create_command_history_entry(&self, entry: &CommandHistoryEntry) -> Result<()>;

    /// Move an entry to `status`, recording `result` and the processing time.
    /// Fails with `InvalidTransition` once the entry is terminal.
    fn update_command_history_entry(
        &self,
        id: &CommandId,
        status: CommandStatus,
        result: Option<&Value>,
    ) -> Result<CommandHistoryEntry>;

    fn get_command_history_entry(&self, id: &CommandId) -> Result<Option<CommandHistoryEntry>>;
}
