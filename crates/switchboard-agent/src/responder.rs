use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use switchboard_core::config::ResponderConfig;
use switchboard_core::types::CommandResult;

use crate::prompt::{RESPONDER_PROMPT, VISUALIZER_PROMPT};
use crate::provider::ProviderError;
use crate::runtime::{AgentRuntime, DEFAULT_MAX_TOKENS};
use crate::summary::local_summary;

/// Turns structured results into the text the user sees.
pub struct ResponseGenerator {
    runtime: Arc<AgentRuntime>,
    config: ResponderConfig,
}

impl ResponseGenerator {
    pub fn new(runtime: Arc<AgentRuntime>, config: ResponderConfig) -> Self {
        Self { runtime, config }
    }

    /// Narrative answer for `result`. Falls back to a deterministic summary
    /// of the full data when the payload is too large for the model, and to
    /// the plain result message on any other model failure.
    pub async fn generate(&self, raw: &str, result: &CommandResult) -> String {
        let payload = self.render_payload(result);
        if payload.chars().count() > self.config.max_payload_chars {
            info!(
                chars = payload.len(),
                max = self.config.max_payload_chars,
                "responder: payload over budget, using local summary"
            );
            return local_summary(result);
        }

        let user = format!("Command: {raw}\n\nResult:\n{payload}");
        match self
            .runtime
            .complete(RESPONDER_PROMPT, &user, None, DEFAULT_MAX_TOKENS)
            .await
        {
            Ok(resp) if !resp.content.trim().is_empty() => resp.content.trim().to_string(),
            Ok(_) => plain_fallback(result),
            Err(e) if e.is_context_overflow() => {
                warn!(error = %e, "responder: model rejected payload size, using local summary");
                local_summary(result)
            }
            Err(e) => {
                warn!(error = %e, "responder: model call failed");
                plain_fallback(result)
            }
        }
    }

    /// Text chart of `data` rendered by the model.
    pub async fn generate_visualization(
        &self,
        data: &Value,
        chart_type: &str,
    ) -> Result<String, ProviderError> {
        let prepared = prepare_payload(data, self.config.max_items);
        let payload = serde_json::to_string_pretty(&prepared)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let chars = payload.chars().count();
        if chars > self.config.max_payload_chars {
            return Err(ProviderError::InputTooLarge {
                chars,
                max: self.config.max_payload_chars,
            });
        }
        let user = format!("Chart type: {chart_type}\n\nData:\n{payload}");
        let resp = self
            .runtime
            .complete(VISUALIZER_PROMPT, &user, None, DEFAULT_MAX_TOKENS)
            .await?;
        Ok(resp.content.trim().to_string())
    }

    fn render_payload(&self, result: &CommandResult) -> String {
        let mut obj = Map::new();
        obj.insert("success".into(), Value::Bool(result.success));
        if let Some(m) = &result.message {
            obj.insert("message".into(), Value::String(m.clone()));
        }
        obj.insert(
            "data".into(),
            prepare_payload(&result.data, self.config.max_items),
        );
        if let Some(e) = &result.error {
            obj.insert("error".into(), Value::String(e.clone()));
        }
        // Serializing a Value cannot fail.
        serde_json::to_string_pretty(&Value::Object(obj)).unwrap_or_default()
    }
}

/// Answer used when the model produced nothing usable.
fn plain_fallback(result: &CommandResult) -> String {
    match (&result.message, &result.error) {
        (Some(m), _) => m.clone(),
        (None, Some(e)) if !result.success => {
            format!("Sorry, that didn't work: {e}")
        }
        _ => local_summary(result),
    }
}

/// Copy of `data` with every array longer than `max_items` cut to its
/// first `max_items` elements. Each cut array gets a sibling
/// `"<key>_summary"` line stating how many items were dropped. A bare
/// top-level array is wrapped as `{"items": [...], "items_summary": ...}`.
pub fn prepare_payload(data: &Value, max_items: usize) -> Value {
    match data {
        Value::Array(items) if items.len() > max_items => {
            let mut obj = Map::new();
            insert_truncated(&mut obj, "items", items, max_items);
            Value::Object(obj)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| prepare_payload(v, max_items))
                .collect(),
        ),
        Value::Object(map) => {
            let mut obj = Map::new();
            for (k, v) in map {
                match v {
                    Value::Array(items) if items.len() > max_items => {
                        insert_truncated(&mut obj, k, items, max_items);
                    }
                    other => {
                        obj.insert(k.clone(), prepare_payload(other, max_items));
                    }
                }
            }
            Value::Object(obj)
        }
        other => other.clone(),
    }
}

fn insert_truncated(obj: &mut Map<String, Value>, key: &str, items: &[Value], max_items: usize) {
    let kept: Vec<Value> = items
        .iter()
        .take(max_items)
        .map(|v| prepare_payload(v, max_items))
        .collect();
    let omitted = items.len() - kept.len();
    obj.insert(key.to_string(), Value::Array(kept));
    obj.insert(
        format!("{key}_summary"),
        Value::String(format!(
            "Showing {max_items} of {} {key} ({omitted} omitted)",
            items.len()
        )),
    );
}
