//! Local Ollama backend (`/api/chat`, non-streaming).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use crate::wire::{read_json, transport_error, with_system, WireMessage};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/chat", base.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        debug!(model = %req.model, "ollama request");
        let body = OllamaChat {
            model: &req.model,
            messages: with_system(req),
            stream: false,
            options: Options {
                num_predict: req.max_tokens,
            },
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let reply: OllamaReply = read_json(self.name(), resp).await?;
        Ok(reply.into())
    }
}

#[derive(Serialize)]
struct OllamaChat<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: Options,
}

#[derive(Serialize)]
struct Options {
    /// Ollama's name for the completion token cap.
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaReply {
    model: String,
    message: ReplyMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

impl From<OllamaReply> for ChatResponse {
    fn from(r: OllamaReply) -> Self {
        ChatResponse {
            content: r.message.content,
            model: r.model,
            tokens_in: r.prompt_eval_count,
            tokens_out: r.eval_count,
            stop_reason: if r.done { "stop".into() } else { String::new() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    #[test]
    fn request_disables_streaming_and_caps_tokens() {
        let req = ChatRequest {
            model: "llama3".into(),
            system: "be brief".into(),
            messages: vec![Message::user("hi")],
            max_tokens: 32,
        };
        let body = serde_json::to_value(OllamaChat {
            model: &req.model,
            messages: with_system(&req),
            stream: false,
            options: Options { num_predict: 32 },
        })
        .unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 32);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn done_reply_maps_to_stop() {
        let raw = r#"{"model":"llama3","message":{"role":"assistant","content":"ok"},"done":true,"eval_count":7}"#;
        let resp: ChatResponse = serde_json::from_str::<OllamaReply>(raw).unwrap().into();
        assert_eq!(resp.content, "ok");
        assert_eq!(resp.stop_reason, "stop");
        assert_eq!((resp.tokens_in, resp.tokens_out), (0, 7));
    }
}
