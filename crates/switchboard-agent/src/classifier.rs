use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use switchboard_core::services::{find_service, ASSISTANT, SYSTEM};
use switchboard_core::types::Classification;

use crate::prompt::classifier_prompt;
use crate::runtime::AgentRuntime;

const CLASSIFIER_MAX_TOKENS: u32 = 512;

/// Confidence assumed when the model omits the field.
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// LLM-backed intent classifier. Never fails: provider errors and
/// unusable output map to low-confidence fallback classifications.
pub struct IntentClassifier {
    runtime: Arc<AgentRuntime>,
}

impl IntentClassifier {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }

    pub async fn classify(&self, text: &str) -> Classification {
        let system = classifier_prompt(Utc::now());
        let model = self.runtime.classifier_model().to_string();

        let response = match self
            .runtime
            .complete(&system, text, Some(&model), CLASSIFIER_MAX_TOKENS)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "classifier: provider call failed");
                return Classification::classifier_error(&e.to_string());
            }
        };

        match parse_classification(&response.content) {
            Some(c) => {
                let c = apply_today_rule(c, text);
                debug!(
                    intent = %c.intent,
                    primary = %c.primary_service,
                    secondary = ?c.secondary_services,
                    confidence = c.confidence,
                    "classifier: command classified"
                );
                c
            }
            None => {
                warn!(raw = %response.content, "classifier: unparseable model output");
                Classification::echo(text)
            }
        }
    }
}

/// Loose view of what the model returns. Accepts both camelCase and
/// snake_case keys.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelOutput {
    #[serde(default)]
    intent: String,
    #[serde(default, alias = "primary_service", alias = "service")]
    primary_service: String,
    #[serde(default, alias = "secondary_services")]
    secondary_services: Vec<String>,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Slice out the outermost JSON object (the model may wrap it in a code
/// block or add prose around it).
pub fn extract_json(raw: &str) -> &str {
    let raw = raw.trim();
    match (raw.find('{'), raw.rfind('}')) {
        (Some(s), Some(e)) if e >= s => &raw[s..=e],
        _ => raw,
    }
}

/// Parse and normalize the model's answer. `None` when the output is not a
/// JSON object with a non-empty intent.
pub fn parse_classification(raw: &str) -> Option<Classification> {
    let out: ModelOutput = serde_json::from_str(extract_json(raw)).ok()?;
    let intent = out.intent.trim().to_lowercase();
    if intent.is_empty() {
        return None;
    }

    let primary = canonical_service(&out.primary_service).unwrap_or_else(|| ASSISTANT.to_string());
    let secondary = out
        .secondary_services
        .iter()
        .filter_map(|s| canonical_service(s))
        .filter(|s| s != ASSISTANT && s != SYSTEM)
        .collect();

    let c = Classification {
        intent,
        primary_service: primary,
        secondary_services: secondary,
        parameters: out.parameters,
        confidence: out.confidence.unwrap_or(DEFAULT_CONFIDENCE),
    };
    Some(c.normalized())
}

/// Map a model-supplied service name onto its canonical registry name.
fn canonical_service(name: &str) -> Option<String> {
    let lower = name.trim().to_lowercase();
    if lower == ASSISTANT || lower == SYSTEM {
        return Some(lower);
    }
    find_service(&lower).map(|spec| spec.name.to_string())
}

static TODAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btoday\b").expect("valid regex"));

/// Commands that say "today" always carry the today flag, whatever the
/// model returned.
pub fn apply_today_rule(c: Classification, text: &str) -> Classification {
    if TODAY.is_match(text) {
        c.with_param("today", true)
            .with_param("time_period", "today")
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl LlmProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: self.0.to_string(),
                model: req.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
                stop_reason: "stop".to_string(),
            })
        }
    }

    struct Down;

    #[async_trait]
    impl LlmProvider for Down {
        fn name(&self) -> &str {
            "down"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unavailable("connection refused".to_string()))
        }
    }

    fn classifier(p: impl LlmProvider + 'static) -> IntentClassifier {
        IntentClassifier::new(Arc::new(AgentRuntime::new(
            Box::new(p),
            "main".into(),
            "small".into(),
        )))
    }

    #[test]
    fn parses_fenced_output_and_resolves_aliases() {
        let raw = "```json\n{\"intent\":\"get_summary\",\"primaryService\":\"Triple Whale\",\"secondaryServices\":[\"tw\",\"Shopify\",\"nope\"],\"confidence\":0.8}\n```";
        // "Triple Whale" is not an alias, so the primary falls back.
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.primary_service, ASSISTANT);
        assert_eq!(c.secondary_services, vec!["triplewhale", "shopify"]);

        let raw = r#"{"intent":"get_summary","primary_service":"triple-whale","secondary_services":["shopify","TW"],"confidence":0.8}"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.primary_service, "triplewhale");
        assert_eq!(c.secondary_services, vec!["shopify"]);
    }

    #[test]
    fn confidence_is_clamped_and_defaulted() {
        let c = parse_classification(r#"{"intent":"x","primaryService":"slack","confidence":7}"#).unwrap();
        assert_eq!(c.confidence, 1.0);
        let c = parse_classification(r#"{"intent":"x","primaryService":"slack"}"#).unwrap();
        assert_eq!(c.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn rejects_non_json_and_empty_intent() {
        assert!(parse_classification("I think this is about Shopify").is_none());
        assert!(parse_classification(r#"{"primaryService":"shopify"}"#).is_none());
    }

    #[test]
    fn today_rule_is_word_bounded() {
        let c = apply_today_rule(Classification::new("get_sales", "shopify", 0.9), "sales today?");
        assert!(c.param_bool("today"));
        assert_eq!(c.param_str("time_period"), Some("today"));

        let c = apply_today_rule(Classification::new("get_sales", "shopify", 0.9), "todays sales");
        assert!(!c.param_bool("today"));
    }

    #[tokio::test]
    async fn provider_failure_yields_error_classification() {
        let c = classifier(Down).classify("shopify sales").await;
        assert_eq!(c.intent, "error");
        assert_eq!(c.primary_service, SYSTEM);
        assert_eq!(c.confidence, 0.0);
        assert!(c.param_str("error").unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn garbage_output_yields_echo() {
        let c = classifier(Canned("sure thing!")).classify("hello there").await;
        assert_eq!(c.intent, "echo");
        assert_eq!(c.primary_service, SYSTEM);
        assert_eq!(c.confidence, 0.1);
        assert_eq!(c.param_str("text"), Some("hello there"));
    }

    #[tokio::test]
    async fn today_is_forced_even_if_model_forgets() {
        let c = classifier(Canned(
            r#"{"intent":"get_sales","primaryService":"shopify","confidence":0.9}"#,
        ))
        .classify("how are shopify sales today")
        .await;
        assert_eq!(c.primary_service, "shopify");
        assert!(c.param_bool("today"));
    }
}
