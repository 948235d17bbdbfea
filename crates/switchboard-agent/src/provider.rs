use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single message in the conversation sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
}

/// Common interface for all LLM providers (Anthropic, OpenAI, Ollama).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a chat request and wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Input too large: {chars} chars (max {max})")]
    InputTooLarge { chars: usize, max: usize },

    /// The backend rejected the prompt as too long for its context window.
    #[error("Context window exceeded: {0}")]
    ContextOverflow(String),
}

/// Message fragments the hosted APIs use when a prompt overflows the window.
const OVERFLOW_MARKERS: &[&str] = &[
    "prompt is too long",
    "context length",
    "context_length_exceeded",
    "maximum context",
    "too many tokens",
    "request too large",
    "input is too long",
];

impl ProviderError {
    /// True for the oversized-input class of failures: the same payload will
    /// never succeed, so callers should shrink it instead of retrying.
    pub fn is_context_overflow(&self) -> bool {
        match self {
            ProviderError::InputTooLarge { .. } | ProviderError::ContextOverflow(_) => true,
            ProviderError::Api { status: 413, .. } => true,
            ProviderError::Api { message, .. } => mentions_overflow(message),
            _ => false,
        }
    }
}

/// True when an error body reads like a context-window rejection.
pub(crate) fn mentions_overflow(message: &str) -> bool {
    let lower = message.to_lowercase();
    OVERFLOW_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_detection() {
        assert!(ProviderError::InputTooLarge { chars: 10, max: 5 }.is_context_overflow());
        assert!(ProviderError::Api {
            status: 413,
            message: String::new()
        }
        .is_context_overflow());
        assert!(ProviderError::Api {
            status: 400,
            message: "prompt is too long: 210000 tokens > 200000 maximum".into()
        }
        .is_context_overflow());
        assert!(!ProviderError::Api {
            status: 500,
            message: "internal".into()
        }
        .is_context_overflow());
        assert!(ProviderError::ContextOverflow("too long".into()).is_context_overflow());
        assert!(!ProviderError::Unavailable("down".into()).is_context_overflow());
    }
}
