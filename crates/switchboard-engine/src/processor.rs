//! The command pipeline, from raw text to a persisted reply.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use switchboard_agent::summary::local_summary;
use switchboard_agent::{AgentRuntime, IntentClassifier, ResponseGenerator};
use switchboard_core::config::{SwitchboardConfig, MAX_COMMAND_BYTES};
use switchboard_core::services::{display_name, is_known_service, mentioned_services, ASSISTANT, SYSTEM};
use switchboard_core::types::{Classification, CommandId, CommandResult, CommandStatus, MessageId, MessageRole, ServiceResult};
use switchboard_services::ServiceContext;
use switchboard_store::{ChatMessage, CommandHistoryEntry, CommandStore, MessageMetadata, StoreError};

use crate::chain::{detect_chain, ChainExecutor};
use crate::detect::{chart_type, enrich, enrich_slash, wants_visualization};
use crate::dispatch::Dispatcher;
use crate::error::{panic_message, EngineError, Result};
use crate::orchestrator::Orchestrator;
use crate::progress::{CompositeReporter, Progress, ProgressReporter, StoreReporter};
use crate::slash::{parse_slash, SlashClassifier};

/// Shown when the pipeline itself broke.
pub const APOLOGY: &str =
    "Sorry, something went wrong while processing your command. Please try again.";

/// What the caller gets back once a command is finished and persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedCommand {
    pub command_id: CommandId,
    pub message_id: MessageId,
    pub status: CommandStatus,
    pub content: String,
    pub direct_response: bool,
}

/// Pipeline result before persistence.
struct Outcome {
    success: bool,
    content: String,
    record: Value,
    direct: bool,
}

impl Outcome {
    fn from_result(content: String, result: &CommandResult) -> Self {
        Self {
            success: result.success,
            content,
            record: json!(result),
            direct: false,
        }
    }

    fn apology(reason: &str) -> Self {
        Self {
            success: false,
            content: APOLOGY.to_string(),
            record: json!({ "error": reason }),
            direct: false,
        }
    }
}

pub struct CommandProcessor {
    store: Arc<dyn CommandStore>,
    runtime: Arc<AgentRuntime>,
    classifier: IntentClassifier,
    slash: SlashClassifier,
    dispatcher: Arc<Dispatcher>,
    orchestrator: Orchestrator,
    chains: ChainExecutor,
    responder: Arc<ResponseGenerator>,
    reporters: Vec<Arc<dyn ProgressReporter>>,
}

impl CommandProcessor {
    pub fn new(
        store: Arc<dyn CommandStore>,
        runtime: Arc<AgentRuntime>,
        dispatcher: Dispatcher,
        config: &SwitchboardConfig,
    ) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let responder = Arc::new(ResponseGenerator::new(
            Arc::clone(&runtime),
            config.responder.clone(),
        ));
        Self {
            reporters: vec![Arc::new(StoreReporter::new(Arc::clone(&store)))],
            store,
            classifier: IntentClassifier::new(Arc::clone(&runtime)),
            runtime,
            slash: SlashClassifier::new(config.chain.default_channel.clone()),
            orchestrator: Orchestrator::new(Arc::clone(&dispatcher)),
            chains: ChainExecutor::new(
                Arc::clone(&dispatcher),
                Arc::clone(&responder),
                config.chain.clone(),
            ),
            dispatcher,
            responder,
        }
    }

    /// Also send progress to `reporter`, after the store.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn store(&self) -> &Arc<dyn CommandStore> {
        &self.store
    }

    /// Run one command end to end. Only input validation and storage
    /// failures surface as errors; everything else ends up in the reply.
    #[instrument(skip(self, raw), fields(len = raw.len()))]
    pub async fn process(&self, raw: &str) -> Result<ProcessedCommand> {
        if raw.len() > MAX_COMMAND_BYTES {
            return Err(EngineError::PayloadTooLarge {
                size: raw.len(),
                max: MAX_COMMAND_BYTES,
            });
        }
        let text = raw.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidCommand("empty command".into()));
        }

        let entry = CommandHistoryEntry::processing(text);
        self.store.create_command_history_entry(&entry)?;
        self.store.create_chat_message(&ChatMessage::new(
            MessageRole::User,
            text,
            MessageMetadata::default(),
        ))?;
        let pending = ChatMessage::new(
            MessageRole::Assistant,
            "",
            MessageMetadata::pending(&entry.id),
        );
        self.store.create_chat_message(&pending)?;

        let reporter = Arc::new(CompositeReporter::new(self.reporters.clone()));
        let progress = Progress::new(reporter, pending.id.clone());

        let outcome = match AssertUnwindSafe(self.run(text, &progress)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(command_id = %entry.id, error = %e, "command pipeline failed");
                Outcome::apology(&e.to_string())
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!(command_id = %entry.id, panic = %msg, "command pipeline panicked");
                Outcome::apology(&msg)
            }
        };

        // History first: the entry must reach a terminal state even when
        // the reply cannot be written.
        let status = if outcome.success {
            CommandStatus::Completed
        } else {
            CommandStatus::Failed
        };
        self.store
            .update_command_history_entry(&entry.id, status, Some(&outcome.record))?;
        if let Err(e) = self.write_reply(&pending, &outcome) {
            warn!(command_id = %entry.id, message_id = %pending.id, error = %e, "failed to persist reply");
        }

        info!(command_id = %entry.id, status = %status, direct = outcome.direct, "command processed");
        Ok(ProcessedCommand {
            command_id: entry.id,
            message_id: pending.id,
            status,
            content: outcome.content,
            direct_response: outcome.direct,
        })
    }

    /// Store the final reply. Re-reads first so the steps recorded during
    /// the run are kept.
    fn write_reply(&self, pending: &ChatMessage, outcome: &Outcome) -> std::result::Result<(), StoreError> {
        let mut metadata = match self.store.get_chat_message(&pending.id)? {
            Some(m) => m.metadata,
            None => pending.metadata.clone(),
        };
        metadata.direct_response = outcome.direct;
        let metadata = metadata.finish(outcome.success);
        self.store
            .update_chat_message(&pending.id, &outcome.content, &metadata)
    }

    async fn run(&self, text: &str, progress: &Progress) -> Result<Outcome> {
        let now = Utc::now();
        let slash = parse_slash(text);

        // Plain conversation: no slash prefix and no service named.
        if slash.is_none() && mentioned_services(text).is_empty() {
            progress.step("Thinking");
            let resp = self.runtime.chat(text).await?;
            return Ok(Outcome {
                success: true,
                content: resp.content.trim().to_string(),
                record: json!({ "service": ASSISTANT, "direct": true }),
                direct: true,
            });
        }

        let c = match &slash {
            Some(cmd) => self
                .slash
                .classify(cmd, now)
                .unwrap_or_else(|| Classification::echo(text)),
            None => {
                progress.step("Understanding your request");
                self.classifier.classify(text).await
            }
        }
        .normalized();
        info!(
            intent = %c.intent,
            primary = %c.primary_service,
            confidence = c.confidence,
            slash = slash.is_some(),
            "command classified"
        );

        let ctx = ServiceContext::from_connections(self.store.list_connections()?);
        // A slash command only chains when it addresses the source itself.
        let chain = detect_chain(text).filter(|plan| {
            slash
                .as_ref()
                .map_or(true, |cmd| cmd.service == plan.source.name)
        });

        if chain.is_none() && wants_visualization(text) && is_known_service(&c.primary_service) {
            return Ok(self.visualize(text, &c, &ctx, progress).await);
        }

        if let Some(plan) = chain {
            let result = self.chains.execute(text, plan, &ctx, now, progress).await;
            let content = match (&result.message, result.success) {
                (Some(m), true) => m.clone(),
                _ => self.respond(text, &result, progress).await,
            };
            return Ok(Outcome::from_result(content, &result));
        }

        let (c, multi) = match slash {
            Some(_) => enrich_slash(c),
            None => enrich(c, text),
        };
        if multi {
            let outcome = self.orchestrator.orchestrate(text, &c, &ctx, progress).await;
            let result = CommandResult {
                success: outcome.success,
                message: Some(outcome.summary.clone()),
                data: json!({ "results": outcome.results }),
                error: (!outcome.success).then(|| "every service failed".to_string()),
            };
            let content = self.respond(text, &result, progress).await;
            return Ok(Outcome::from_result(content, &result));
        }

        progress.step(&format!("Querying {}", display_name(&c.primary_service)));
        let result = self.dispatcher.dispatch(text, &c, &ctx).await;
        let content = if answers_itself(&c, &result) {
            direct_text(&result)
        } else {
            self.respond(text, &CommandResult::from(result.clone()), progress)
                .await
        };
        Ok(Outcome::from_result(content, &CommandResult::from(result)))
    }

    /// Single-service query rendered as a chart. Falls back to the normal
    /// narrative when the data or the chart is unavailable.
    async fn visualize(
        &self,
        text: &str,
        c: &Classification,
        ctx: &ServiceContext,
        progress: &Progress,
    ) -> Outcome {
        progress.step(&format!("Querying {}", display_name(&c.primary_service)));
        let result = CommandResult::from(self.dispatcher.dispatch(text, c, ctx).await);
        if result.success {
            progress.step("Rendering chart");
            match self
                .responder
                .generate_visualization(&result.data, chart_type(text))
                .await
            {
                Ok(chart) if !chart.is_empty() => return Outcome::from_result(chart, &result),
                Ok(_) => warn!("empty chart, falling back to narrative"),
                Err(e) => warn!(error = %e, "chart rendering failed, falling back to narrative"),
            }
        }
        let content = self.respond(text, &result, progress).await;
        Outcome::from_result(content, &result)
    }

    async fn respond(&self, text: &str, result: &CommandResult, progress: &Progress) -> String {
        progress.step("Writing response");
        self.responder.generate(text, result).await
    }
}

/// Help text, the conversational fallback and system notices are already
/// the final answer.
fn answers_itself(c: &Classification, result: &ServiceResult) -> bool {
    c.intent == "help" || result.service == ASSISTANT || result.service == SYSTEM
}

fn direct_text(result: &ServiceResult) -> String {
    if !result.success {
        if let Some(err) = &result.error {
            return err.clone();
        }
    }
    match result.result.get("message").and_then(|m| m.as_str()) {
        Some(m) => m.to_string(),
        None => local_summary(&CommandResult::from(result.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_text_prefers_error_on_failure() {
        let r = ServiceResult::failed_with(SYSTEM, "try /shopify help", json!({ "message": "x" }));
        assert_eq!(direct_text(&r), "try /shopify help");
        let r = ServiceResult::ok(ASSISTANT, json!({ "message": "Hello!" }));
        assert_eq!(direct_text(&r), "Hello!");
    }

    #[test]
    fn help_answers_itself() {
        let c = Classification::new("help", "shopify", 0.7);
        assert!(answers_itself(&c, &ServiceResult::ok("shopify", Value::Null)));
        let c = Classification::new("get_sales", "shopify", 1.0);
        assert!(!answers_itself(&c, &ServiceResult::ok("shopify", Value::Null)));
    }
}
