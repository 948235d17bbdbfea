use rusqlite::Connection;

use crate::error::Result;

/// Create the connections, chat message and command history tables.
///
/// Safe to call on every startup: uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS connections (
            service_type  TEXT PRIMARY KEY,
            is_connected  INTEGER NOT NULL DEFAULT 0,
            credentials   TEXT NOT NULL DEFAULT '{}',
            updated_at    TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS chat_messages (
            seq           INTEGER PRIMARY KEY AUTOINCREMENT,
            id            TEXT NOT NULL UNIQUE,
            role          TEXT NOT NULL,
            content       TEXT NOT NULL,
            metadata      TEXT NOT NULL DEFAULT '{}',
            created_at    TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS command_history (
            id            TEXT PRIMARY KEY,
            command       TEXT NOT NULL,
            result        TEXT,
            status        TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            processed_at  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_command_history_created
            ON command_history(created_at DESC);",
    )?;
    Ok(())
}
