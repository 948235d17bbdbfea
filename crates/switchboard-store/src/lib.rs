pub mod db;
pub mod error;
pub mod sqlite;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use sqlite::SqliteStore;
pub use store::CommandStore;
pub use types::{ChatMessage, CommandHistoryEntry, DeliveryStatus, MessageMetadata, ServiceConnection};
