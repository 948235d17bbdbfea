use thiserror::Error;

use switchboard_agent::ProviderError;
use switchboard_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("command too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Provider(#[from] ProviderError),

    /// A pipeline stage panicked; the message is the panic payload.
    #[error("internal error: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
