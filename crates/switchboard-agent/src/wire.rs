//! HTTP plumbing shared by the hosted chat backends.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::provider::{mentions_overflow, ChatRequest, ProviderError};

/// Back-off assumed when a 429 carries no usable `retry-after`.
const DEFAULT_RETRY_AFTER_MS: u64 = 5_000;

/// One entry of a chat-completions style `messages` array.
#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// System prompt first, then the conversation, as OpenAI-compatible APIs
/// (OpenAI itself, Ollama) expect it.
pub(crate) fn with_system(req: &ChatRequest) -> Vec<WireMessage<'_>> {
    std::iter::once(WireMessage {
        role: "system",
        content: &req.system,
    })
    .chain(req.messages.iter().map(|m| WireMessage {
        role: m.role.as_str(),
        content: &m.content,
    }))
    .collect()
}

/// Refused connections and timeouts let the router move to the next
/// provider; anything else is a plain HTTP failure.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_connect() || e.is_timeout() {
        ProviderError::Unavailable(e.to_string())
    } else {
        ProviderError::Http(e)
    }
}

/// Decode a successful body, or turn the status into a typed error.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &str,
    resp: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("{provider}: {e}")));
    }

    let retry_after = resp
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = resp.text().await.unwrap_or_default();
    warn!(provider, status = status.as_u16(), body = %body, "chat backend returned an error");
    Err(classify_failure(status.as_u16(), retry_after.as_deref(), body))
}

/// Map a failed response onto the error the router and responder act on.
pub(crate) fn classify_failure(status: u16, retry_after: Option<&str>, body: String) -> ProviderError {
    if status == 429 {
        let retry_after_ms = retry_after
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(DEFAULT_RETRY_AFTER_MS, |secs| secs * 1_000);
        return ProviderError::RateLimited { retry_after_ms };
    }
    if status == 413 || mentions_overflow(&body) {
        return ProviderError::ContextOverflow(body);
    }
    ProviderError::Api { status, message: body }
}
