use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwitchboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Service not connected: {service}")]
    NotConnected { service: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Short error code string returned in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SwitchboardError::Config(_) => "CONFIG_ERROR",
            SwitchboardError::AuthFailed(_) => "AUTH_FAILED",
            SwitchboardError::InvalidCommand(_) => "INVALID_COMMAND",
            SwitchboardError::UnknownService(_) => "UNKNOWN_SERVICE",
            SwitchboardError::NotConnected { .. } => "NOT_CONNECTED",
            SwitchboardError::Database(_) => "DATABASE_ERROR",
            SwitchboardError::LlmProvider(_) => "LLM_PROVIDER_ERROR",
            SwitchboardError::Serialization(_) => "SERIALIZATION_ERROR",
            SwitchboardError::Io(_) => "IO_ERROR",
            SwitchboardError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            SwitchboardError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SwitchboardError>;
