use tokio::sync::RwLock;
use tracing::info;

use crate::prompt::ASSISTANT_PROMPT;
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError};

/// Default output budget for narrative responses.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Central agent runtime: holds the LLM provider and the model names.
/// Shared across the classifier, the responder and the conversational
/// fallback via Arc.
pub struct AgentRuntime {
    provider: Box<dyn LlmProvider>,
    default_model: RwLock<String>,
    classifier_model: String,
}

impl AgentRuntime {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        default_model: String,
        classifier_model: String,
    ) -> Self {
        Self {
            provider,
            default_model: RwLock::new(default_model),
            classifier_model,
        }
    }

    /// Get the current default model name.
    pub async fn get_model(&self) -> String {
        self.default_model.read().await.clone()
    }

    /// Change the default model at runtime. Returns the previous model.
    pub async fn set_model(&self, model: String) -> String {
        let mut guard = self.default_model.write().await;
        std::mem::replace(&mut *guard, model)
    }

    /// Cheaper model used for routing decisions.
    pub fn classifier_model(&self) -> &str {
        &self.classifier_model
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        &*self.provider
    }

    /// One-shot completion with an explicit system prompt.
    pub async fn complete(
        &self,
        system: &str,
        user_message: &str,
        model_override: Option<&str>,
        max_tokens: u32,
    ) -> Result<ChatResponse, ProviderError> {
        let model = match model_override {
            Some(m) => m.to_string(),
            None => self.get_model().await,
        };
        let req = ChatRequest {
            model,
            system: system.to_string(),
            messages: vec![Message::user(user_message)],
            max_tokens,
        };
        info!(model = %req.model, provider = %self.provider.name(), "processing completion request");
        self.provider.send(&req).await
    }

    /// Free-form conversation with the general-purpose assistant prompt.
    pub async fn chat(&self, user_message: &str) -> Result<ChatResponse, ProviderError> {
        self.complete(ASSISTANT_PROMPT, user_message, None, DEFAULT_MAX_TOKENS)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoModel;

    #[async_trait]
    impl LlmProvider for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: req.messages[0].content.clone(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "stop".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn complete_uses_override_then_default() {
        let rt = AgentRuntime::new(Box::new(EchoModel), "big".into(), "small".into());
        let resp = rt.complete("sys", "hi", Some("small"), 16).await.unwrap();
        assert_eq!(resp.model, "small");
        assert_eq!(resp.content, "hi");

        let resp = rt.chat("hello").await.unwrap();
        assert_eq!(resp.model, "big");
    }

    #[tokio::test]
    async fn set_model_returns_previous() {
        let rt = AgentRuntime::new(Box::new(EchoModel), "a".into(), "c".into());
        assert_eq!(rt.set_model("b".into()).await, "a");
        assert_eq!(rt.get_model().await, "b");
    }
}
