use thiserror::Error;

use switchboard_core::types::CommandStatus;

/// Errors that can occur during persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A history entry was asked to leave a terminal state.
    #[error("command {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: CommandStatus,
        to: CommandStatus,
    },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored column held a value the current code cannot interpret.
    #[error("invalid stored value: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
