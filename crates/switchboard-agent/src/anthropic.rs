//! Anthropic Messages API backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError};
use crate::wire::{read_json, transport_error};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: format!("{}/v1/messages", base.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        debug!(model = %req.model, max_tokens = req.max_tokens, "anthropic request");
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesRequest::from(req))
            .send()
            .await
            .map_err(transport_error)?;
        let body: MessagesResponse = read_json(self.name(), resp).await?;
        Ok(body.into())
    }
}

/// Anthropic keeps the system prompt out of `messages`.
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
}

impl<'a> From<&'a ChatRequest> for MessagesRequest<'a> {
    fn from(req: &'a ChatRequest) -> Self {
        Self {
            model: &req.model,
            max_tokens: req.max_tokens,
            system: &req.system,
            messages: &req.messages,
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<Block>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

/// Only text blocks reach the caller; thinking and tool blocks are dropped.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl From<MessagesResponse> for ChatResponse {
    fn from(resp: MessagesResponse) -> Self {
        let content = resp
            .content
            .into_iter()
            .filter_map(|b| match b {
                Block::Text { text } => Some(text),
                Block::Other => None,
            })
            .collect();
        ChatResponse {
            content,
            model: resp.model,
            tokens_in: resp.usage.input_tokens,
            tokens_out: resp.usage.output_tokens,
            stop_reason: resp.stop_reason.unwrap_or_default(),
        }
    }
}
