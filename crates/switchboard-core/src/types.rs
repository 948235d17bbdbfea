use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::services::{ASSISTANT, SYSTEM};

/// Identifier of a command history entry (UUIDv7, time-sortable in logs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(pub String);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CommandId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What a command means and where it should be routed.
///
/// Produced once per command. Later stages return enriched copies rather
/// than mutating a shared instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub intent: String,
    pub primary_service: String,
    #[serde(default)]
    pub secondary_services: Vec<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub confidence: f64,
}

impl Classification {
    pub fn new(intent: impl Into<String>, primary_service: impl Into<String>, confidence: f64) -> Self {
        Self {
            intent: intent.into(),
            primary_service: primary_service.into(),
            secondary_services: Vec::new(),
            parameters: Map::new(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Route to the general-purpose conversational service.
    pub fn conversational(text: &str) -> Self {
        Self::new("chat", ASSISTANT, 1.0).with_param("query", text)
    }

    /// Fallback used when the model call itself failed.
    pub fn classifier_error(error: &str) -> Self {
        Self::new("error", SYSTEM, 0.0).with_param("error", error)
    }

    /// Fallback used when the model answered but the answer was unusable.
    pub fn echo(text: &str) -> Self {
        Self::new("echo", SYSTEM, 0.1).with_param("text", text)
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    pub fn param_bool(&self, key: &str) -> bool {
        self.parameters
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Copy of this classification aimed at another service, with fan-out
    /// cleared so the derived call can never recurse into another fan-out.
    pub fn derive_for(&self, service: &str) -> Self {
        Self {
            intent: self.intent.clone(),
            primary_service: service.to_string(),
            secondary_services: Vec::new(),
            parameters: self.parameters.clone(),
            confidence: self.confidence,
        }
    }

    /// Enforce the structural invariants: non-empty primary, no primary or
    /// duplicates in the secondary list, confidence within [0, 1].
    pub fn normalized(mut self) -> Self {
        if self.primary_service.trim().is_empty() {
            self.primary_service = ASSISTANT.to_string();
        }
        let primary = self.primary_service.clone();
        let mut seen: Vec<String> = Vec::with_capacity(self.secondary_services.len());
        for s in self.secondary_services.drain(..) {
            if s != primary && !s.is_empty() && !seen.contains(&s) {
                seen.push(s);
            }
        }
        self.secondary_services = seen;
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

/// Normalized outcome of one service invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResult {
    pub service: String,
    pub success: bool,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceResult {
    pub fn ok(service: impl Into<String>, result: Value) -> Self {
        Self {
            service: service.into(),
            success: true,
            result,
            error: None,
        }
    }

    pub fn failed(service: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            success: false,
            result: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Failure that still carries whatever payload the client returned.
    pub fn failed_with(service: impl Into<String>, error: impl Into<String>, result: Value) -> Self {
        Self {
            service: service.into(),
            success: false,
            result,
            error: Some(error.into()),
        }
    }
}

/// Structured result handed to the response generator: either a single
/// service outcome or the merged outcome of a fan-out or chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    /// Human-readable summary already computed by the pipeline, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            message: None,
            data,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: Value::Null,
            error: Some(error.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl From<ServiceResult> for CommandResult {
    fn from(r: ServiceResult) -> Self {
        Self {
            success: r.success,
            message: None,
            data: r.result,
            error: r.error,
        }
    }
}

/// Lifecycle of a command history entry. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Processing,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Processing => "processing",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CommandStatus::Processing)
    }

    /// Only `processing → completed|failed` is allowed.
    pub fn can_transition_to(&self, next: CommandStatus) -> bool {
        matches!(self, CommandStatus::Processing) && next.is_terminal()
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "processing" => Ok(CommandStatus::Processing),
            "completed" => Ok(CommandStatus::Completed),
            "failed" => Ok(CommandStatus::Failed),
            other => Err(format!("unknown command status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_strips_primary_and_duplicates() {
        let mut c = Classification::new("get_sales", "shopify", 0.9);
        c.secondary_services = vec![
            "slack".into(),
            "shopify".into(),
            "slack".into(),
            "notion".into(),
        ];
        let c = c.normalized();
        assert_eq!(c.secondary_services, vec!["slack", "notion"]);
    }

    #[test]
    fn normalized_fills_empty_primary() {
        let c = Classification::new("chat", "  ", 0.4).normalized();
        assert_eq!(c.primary_service, ASSISTANT);
    }

    #[test]
    fn confidence_is_clamped() {
        let c = Classification::new("x", "shopify", 3.0);
        assert_eq!(c.confidence, 1.0);
        let mut c = Classification::new("x", "shopify", 0.5);
        c.confidence = f64::NAN;
        assert_eq!(c.normalized().confidence, 0.0);
    }

    #[test]
    fn derive_for_clears_fan_out() {
        let mut c = Classification::new("get_metrics", "klaviyo", 0.8).with_param("today", true);
        c.secondary_services = vec!["postscript".into()];
        let d = c.derive_for("postscript");
        assert_eq!(d.primary_service, "postscript");
        assert!(d.secondary_services.is_empty());
        assert!(d.param_bool("today"));
    }

    #[test]
    fn classification_wire_format_is_camel_case() {
        let c = Classification::new("get_sales", "shopify", 1.0);
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains(r#""primaryService":"shopify""#));
        assert!(json.contains(r#""secondaryServices":[]"#));
    }

    #[test]
    fn status_transitions_only_forward() {
        assert!(CommandStatus::Processing.can_transition_to(CommandStatus::Completed));
        assert!(CommandStatus::Processing.can_transition_to(CommandStatus::Failed));
        assert!(!CommandStatus::Completed.can_transition_to(CommandStatus::Failed));
        assert!(!CommandStatus::Failed.can_transition_to(CommandStatus::Processing));
        assert!(!CommandStatus::Processing.can_transition_to(CommandStatus::Processing));
    }
}
