use tracing::{info, warn};

use switchboard_agent::anthropic::AnthropicProvider;
use switchboard_agent::ollama::OllamaProvider;
use switchboard_agent::openai::OpenAiProvider;
use switchboard_agent::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use switchboard_agent::router::{ProviderRouter, ProviderSlot};
use switchboard_core::config::SwitchboardConfig;

/// Build the LLM provider chain from config.
///
/// Priority order:
///   1. providers.anthropic
///   2. providers.openai
///   3. providers.ollama
///   4. Env vars (ANTHROPIC_API_KEY, OPENAI_API_KEY)
///
/// When multiple providers are configured a ProviderRouter is built so
/// requests automatically fail over to the next slot on error.
pub fn build_provider(config: &SwitchboardConfig) -> Box<dyn LlmProvider> {
    let mut slots: Vec<ProviderSlot> = Vec::new();

    if let Some(ref anthropic) = config.providers.anthropic {
        info!("LLM provider slot[{}]: Anthropic ({})", slots.len(), anthropic.base_url);
        slots.push(ProviderSlot::new(
            Box::new(AnthropicProvider::new(
                anthropic.api_key.clone(),
                Some(anthropic.base_url.clone()),
            )),
            1,
        ));
    }

    if let Some(ref openai) = config.providers.openai {
        info!("LLM provider slot[{}]: OpenAI ({})", slots.len(), openai.base_url);
        slots.push(ProviderSlot::new(
            Box::new(OpenAiProvider::new(
                openai.api_key.clone(),
                Some(openai.base_url.clone()),
            )),
            1,
        ));
    }

    if let Some(ref ollama) = config.providers.ollama {
        info!("LLM provider slot[{}]: Ollama ({})", slots.len(), ollama.base_url);
        slots.push(ProviderSlot::new(
            Box::new(OllamaProvider::new(Some(ollama.base_url.clone()))),
            0,
        ));
    }

    // env fallbacks, only when nothing is configured
    if slots.is_empty() {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            info!("LLM provider: Anthropic (from env)");
            slots.push(ProviderSlot::new(Box::new(AnthropicProvider::new(key, None)), 1));
        } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            info!("LLM provider: OpenAI (from env)");
            slots.push(ProviderSlot::new(Box::new(OpenAiProvider::new(key, None)), 1));
        }
    }

    match slots.len() {
        0 => {
            warn!("No LLM provider configured, natural-language commands will fail");
            Box::new(NullProvider)
        }
        1 => slots.remove(0).provider,
        _ => {
            info!("ProviderRouter: {} slots configured (automatic failover)", slots.len());
            Box::new(ProviderRouter::new(slots))
        }
    }
}

/// Placeholder provider when no API key is available.
pub struct NullProvider;

#[async_trait::async_trait]
impl LlmProvider for NullProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::Unavailable(
            "no LLM provider configured, set providers.anthropic.api_key in switchboard.toml".into(),
        ))
    }
}
