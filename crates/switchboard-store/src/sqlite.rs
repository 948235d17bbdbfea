use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, instrument};

use switchboard_core::types::{CommandId, CommandStatus, MessageId, MessageRole};

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::store::CommandStore;
use crate::types::{ChatMessage, CommandHistoryEntry, MessageMetadata, ServiceConnection};

/// SQLite-backed store.
///
/// Wraps a single connection in a `Mutex`; every call holds the lock only
/// for the duration of one statement (or one read-check-write sequence).
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Open (or create) the database file in WAL mode and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        init_db(&conn)?;
        Ok(Self::new(conn))
    }

    /// Fresh private database, used by tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self::new(conn))
    }
}

const MESSAGE_COLUMNS: &str = "id, role, content, metadata, created_at";
const HISTORY_COLUMNS: &str = "id, command, result, status, created_at, processed_at";

impl CommandStore for SqliteStore {
    #[instrument(skip(self))]
    fn get_connection_by_type(&self, service_type: &str) -> Result<Option<ServiceConnection>> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                "SELECT service_type, is_connected, credentials
                 FROM connections WHERE service_type = ?1",
                params![service_type],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(row_to_connection).transpose()
    }

    #[instrument(skip(self))]
    fn list_connections(&self) -> Result<Vec<ServiceConnection>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT service_type, is_connected, credentials
             FROM connections ORDER BY service_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row_to_connection(row?)?);
        }
        Ok(out)
    }

    #[instrument(skip(self, connection), fields(service = %connection.service_type))]
    fn upsert_connection(&self, connection: &ServiceConnection) -> Result<()> {
        let credentials = serde_json::to_string(&connection.credentials)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO connections (service_type, is_connected, credentials, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(service_type) DO UPDATE SET
                 is_connected = excluded.is_connected,
                 credentials  = excluded.credentials,
                 updated_at   = excluded.updated_at",
            params![connection.service_type, connection.is_connected, credentials, now],
        )?;
        debug!("connection saved");
        Ok(())
    }

    #[instrument(skip(self, message), fields(id = %message.id, role = %message.role))]
    fn create_chat_message(&self, message: &ChatMessage) -> Result<()> {
        let metadata = serde_json::to_string(&message.metadata)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO chat_messages (id, role, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.as_str(),
                message.role.as_str(),
                message.content,
                metadata,
                message.created_at
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self, content, metadata), fields(id = %id))]
    fn update_chat_message(
        &self,
        id: &MessageId,
        content: &str,
        metadata: &MessageMetadata,
    ) -> Result<()> {
        let metadata = serde_json::to_string(metadata)?;
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE chat_messages SET content = ?1, metadata = ?2 WHERE id = ?3",
            params![content, metadata, id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound {
                kind: "chat message",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id))]
    fn get_chat_message(&self, id: &MessageId) -> Result<Option<ChatMessage>> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = ?1"),
                params![id.as_str()],
                read_message_row,
            )
            .optional()?;
        row.map(row_to_message).transpose()
    }

    #[instrument(skip(self))]
    fn list_chat_messages(&self, limit: usize) -> Result<Vec<ChatMessage>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                 SELECT seq, {MESSAGE_COLUMNS} FROM chat_messages
                 ORDER BY seq DESC LIMIT ?1
             ) ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map(params![limit as i64], read_message_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row_to_message(row?)?);
        }
        Ok(out)
    }

    #[instrument(skip(self, entry), fields(id = %entry.id))]
    fn create_command_history_entry(&self, entry: &CommandHistoryEntry) -> Result<()> {
        let result = entry.result.as_ref().map(serde_json::to_string).transpose()?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO command_history (id, command, result, status, created_at, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id.as_str(),
                entry.command,
                result,
                entry.status.as_str(),
                entry.created_at,
                entry.processed_at
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self, result), fields(id = %id, status = %status))]
    fn update_command_history_entry(
        &self,
        id: &CommandId,
        status: CommandStatus,
        result: Option<&Value>,
    ) -> Result<CommandHistoryEntry> {
        let result_json = result.map(serde_json::to_string).transpose()?;
        let db = self.db.lock().unwrap();

        let current = db
            .query_row(
                &format!("SELECT {HISTORY_COLUMNS} FROM command_history WHERE id = ?1"),
                params![id.as_str()],
                read_history_row,
            )
            .optional()?
            .map(row_to_history)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound {
                kind: "command",
                id: id.to_string(),
            })?;

        if !current.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                to: status,
            });
        }

        let processed_at = status
            .is_terminal()
            .then(|| chrono::Utc::now().to_rfc3339());
        db.execute(
            "UPDATE command_history
             SET status = ?1, result = COALESCE(?2, result), processed_at = ?3
             WHERE id = ?4",
            params![status.as_str(), result_json, processed_at, id.as_str()],
        )?;
        debug!("command history updated");

        Ok(CommandHistoryEntry {
            status,
            result: result.cloned().or(current.result),
            processed_at,
            ..current
        })
    }

    #[instrument(skip(self), fields(id = %id))]
    fn get_command_history_entry(&self, id: &CommandId) -> Result<Option<CommandHistoryEntry>> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                &format!("SELECT {HISTORY_COLUMNS} FROM command_history WHERE id = ?1"),
                params![id.as_str()],
                read_history_row,
            )
            .optional()?;
        row.map(row_to_history).transpose()
    }
}

type ConnectionRow = (String, bool, String);
type MessageRow = (String, String, String, String, String);
type HistoryRow = (String, String, Option<String>, String, String, Option<String>);

fn row_to_connection((service_type, is_connected, credentials): ConnectionRow) -> Result<ServiceConnection> {
    Ok(ServiceConnection {
        service_type,
        is_connected,
        credentials: serde_json::from_str(&credentials)?,
    })
}

fn read_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn row_to_message((id, role, content, metadata, created_at): MessageRow) -> Result<ChatMessage> {
    let role: MessageRole = role.parse().map_err(StoreError::InvalidData)?;
    Ok(ChatMessage {
        id: MessageId(id),
        role,
        content,
        metadata: serde_json::from_str(&metadata)?,
        created_at,
    })
}

fn read_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn row_to_history(
    (id, command, result, status, created_at, processed_at): HistoryRow,
) -> Result<CommandHistoryEntry> {
    let status: CommandStatus = status.parse().map_err(StoreError::InvalidData)?;
    let result = result.map(|r| serde_json::from_str(&r)).transpose()?;
    Ok(CommandHistoryEntry {
        id: CommandId(id),
        command,
        result,
        status,
        created_at,
        processed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeliveryStatus;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn connection_upsert_round_trip() {
        let s = store();
        assert!(s.get_connection_by_type("shopify").unwrap().is_none());

        s.upsert_connection(&ServiceConnection::new(
            "shopify",
            true,
            json!({ "access_token": "shpat_1" }),
        ))
        .unwrap();
        s.upsert_connection(&ServiceConnection::new(
            "shopify",
            false,
            json!({ "access_token": "shpat_2" }),
        ))
        .unwrap();

        let c = s.get_connection_by_type("shopify").unwrap().unwrap();
        assert!(!c.is_connected);
        assert_eq!(c.credentials["access_token"], "shpat_2");
        assert_eq!(s.list_connections().unwrap().len(), 1);
    }

    #[test]
    fn messages_update_and_list_in_order() {
        let s = store();
        let first = ChatMessage::new(MessageRole::User, "hi", MessageMetadata::default());
        let second = ChatMessage::new(MessageRole::Assistant, "...", MessageMetadata::default());
        let third = ChatMessage::new(MessageRole::User, "again", MessageMetadata::default());
        for m in [&first, &second, &third] {
            s.create_chat_message(m).unwrap();
        }

        let meta = MessageMetadata {
            steps: vec!["Classifying".into()],
            ..MessageMetadata::default()
        }
        .finish(true);
        s.update_chat_message(&second.id, "hello!", &meta).unwrap();

        let got = s.get_chat_message(&second.id).unwrap().unwrap();
        assert_eq!(got.content, "hello!");
        assert_eq!(got.metadata.delivery_status, DeliveryStatus::Delivered);
        assert_eq!(got.metadata.steps, vec!["Classifying"]);

        let last_two = s.list_chat_messages(2).unwrap();
        let contents: Vec<_> = last_two.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello!", "again"]);
    }

    #[test]
    fn updating_missing_message_is_not_found() {
        let err = store()
            .update_chat_message(&MessageId::from("nope"), "x", &MessageMetadata::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn history_moves_forward_only() {
        let s = store();
        let entry = CommandHistoryEntry::processing("/shopify sales");
        s.create_command_history_entry(&entry).unwrap();

        let done = s
            .update_command_history_entry(
                &entry.id,
                CommandStatus::Completed,
                Some(&json!({ "success": true })),
            )
            .unwrap();
        assert_eq!(done.status, CommandStatus::Completed);
        assert!(done.processed_at.is_some());

        let err = s
            .update_command_history_entry(&entry.id, CommandStatus::Failed, None)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: CommandStatus::Completed,
                to: CommandStatus::Failed,
                ..
            }
        ));

        let stored = s.get_command_history_entry(&entry.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Completed);
        assert_eq!(stored.result, Some(json!({ "success": true })));
    }

    #[test]
    fn processing_to_processing_is_rejected() {
        let s = store();
        let entry = CommandHistoryEntry::processing("x");
        s.create_command_history_entry(&entry).unwrap();
        let err = s
            .update_command_history_entry(&entry.id, CommandStatus::Processing, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn open_creates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let s = SqliteStore::open(&path).unwrap();
        s.create_command_history_entry(&CommandHistoryEntry::processing("x"))
            .unwrap();
        assert!(path.exists());
    }
}
