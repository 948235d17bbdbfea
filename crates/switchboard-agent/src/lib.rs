pub mod anthropic;
pub mod classifier;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod responder;
pub mod router;
pub mod runtime;
pub mod summary;
mod wire;

pub use classifier::IntentClassifier;
pub use provider::{LlmProvider, ProviderError};
pub use responder::ResponseGenerator;
pub use runtime::AgentRuntime;
