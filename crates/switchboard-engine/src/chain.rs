//! Pull-then-push commands: read from one service, post a digest to another.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use switchboard_agent::summary::text_digest;
use switchboard_agent::ResponseGenerator;
use switchboard_core::config::ChainConfig;
use switchboard_core::services::{find_service, mentioned_services, ServiceSpec};
use switchboard_core::types::CommandResult;
use switchboard_services::{ServiceContext, ServiceRequest};

use crate::detect::{chart_type, wants_visualization};
use crate::dispatch::Dispatcher;
use crate::progress::Progress;
use crate::slash::parse_slash;
use crate::timewindow::TimeWindow;

/// Rolling window used when the command names none.
const DEFAULT_WINDOW_DAYS: u32 = 7;

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z][\w-]*)").expect("valid regex"));
static SLACK_CHANNEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bto\s+(?:the\s+)?slack\s+channel\s+#?([A-Za-z][\w-]*)").expect("valid regex")
});
static SEND_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:send|post|share|forward)\b").expect("valid regex"));
static TO_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bto\s+(?:the\s+)?#?([A-Za-z][\w-]*)").expect("valid regex")
});
static IN_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bin\s+(?:the\s+)?#?([A-Za-z][\w-]*)").expect("valid regex")
});

/// Words after "in" that start a phrase rather than name a channel.
const IN_STOPWORDS: &[&str] = &["the", "last", "this", "a", "my", "our", "past"];

/// Source and sink of a detected chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainPlan {
    pub source: &'static ServiceSpec,
    pub sink: &'static ServiceSpec,
}

/// A chain needs a source-capable and a sink-capable service in the text,
/// plus an explicit source command or a "send ... to" phrase.
pub fn detect_chain(raw: &str) -> Option<ChainPlan> {
    let mentioned = mentioned_services(raw);
    let source = *mentioned.iter().find(|s| s.is_source())?;
    let sink = *mentioned
        .iter()
        .find(|s| s.sink && s.name != source.name)?;

    let explicit_source = parse_slash(raw).is_some_and(|cmd| cmd.service == source.name)
        || source.source_intent.is_some_and(|intent| {
            raw.to_lowercase()
                .contains(&format!("{} {}", source.name, intent))
        });
    let send_phrase = SEND_VERB
        .find(raw)
        .is_some_and(|m| TO_TARGET.is_match(&raw[m.end()..]));

    (explicit_source || send_phrase).then_some(ChainPlan { source, sink })
}

/// Destination channel named in the text, or `default`.
pub fn resolve_channel(raw: &str, default: &str) -> String {
    if let Some(c) = HASHTAG.captures(raw) {
        return c[1].to_string();
    }
    if let Some(c) = SLACK_CHANNEL.captures(raw) {
        return c[1].to_string();
    }
    if let Some(m) = SEND_VERB.find(raw) {
        let found = TO_TARGET
            .captures_iter(&raw[m.end()..])
            .map(|c| c[1].to_string())
            .find(|word| find_service(word).is_none());
        if let Some(channel) = found {
            return channel;
        }
    }
    IN_TARGET
        .captures_iter(raw)
        .map(|c| c[1].to_string())
        .find(|word| {
            find_service(word).is_none() && !IN_STOPWORDS.contains(&word.to_lowercase().as_str())
        })
        .unwrap_or_else(|| default.to_string())
}

/// Runs chain plans step by step, stopping at the first failure. Side
/// effects already committed stay committed.
pub struct ChainExecutor {
    dispatcher: Arc<Dispatcher>,
    responder: Arc<ResponseGenerator>,
    config: ChainConfig,
}

impl ChainExecutor {
    pub fn new(dispatcher: Arc<Dispatcher>, responder: Arc<ResponseGenerator>, config: ChainConfig) -> Self {
        Self {
            dispatcher,
            responder,
            config,
        }
    }

    pub async fn execute(
        &self,
        raw: &str,
        plan: ChainPlan,
        ctx: &ServiceContext,
        now: DateTime<Utc>,
        progress: &Progress,
    ) -> CommandResult {
        let (source, sink) = (plan.source, plan.sink);
        let Some(intent) = source.source_intent else {
            return CommandResult::failed(format!("{} cannot be used as a data source", source.display_name));
        };

        let window = TimeWindow::parse(raw, now)
            .unwrap_or_else(|| TimeWindow::last_days(DEFAULT_WINDOW_DAYS, now));
        let channel = resolve_channel(raw, &self.config.default_channel);
        info!(
            source = source.name,
            sink = sink.name,
            %channel,
            window = %window.label,
            "executing chained command"
        );

        progress.step(&format!("Fetching {} data", source.display_name));
        let mut request = ServiceRequest::new(source.name, intent, raw);
        window.apply(&mut request.parameters);
        let pulled = self.dispatcher.dispatch_request(request, ctx).await;
        if !pulled.success {
            let err = pulled.error.clone().unwrap_or_else(|| "unknown error".into());
            return CommandResult {
                data: json!({ "source": pulled }),
                ..CommandResult::failed(format!("{} request failed: {err}", source.display_name))
            };
        }

        let title = format!(
            "{} {} ({})",
            source.display_name,
            intent.trim_start_matches("get_").replace('_', " "),
            window.label
        );
        let message = if wants_visualization(raw) {
            progress.step("Rendering chart");
            match self
                .responder
                .generate_visualization(&pulled.result, chart_type(raw))
                .await
            {
                Ok(chart) if !chart.is_empty() => format!("{title}\n{chart}"),
                Ok(_) => text_digest(&title, &pulled.result, self.config.preview_count),
                Err(e) => {
                    warn!(error = %e, "chart rendering failed, sending text summary");
                    text_digest(&title, &pulled.result, self.config.preview_count)
                }
            }
        } else {
            text_digest(&title, &pulled.result, self.config.preview_count)
        };

        progress.step(&format!("Sending to {} #{channel}", sink.display_name));
        let request = ServiceRequest::new(sink.name, "send_message", raw)
            .with_param("channel", channel.as_str())
            .with_param("message", message.as_str());
        let pushed = self.dispatcher.dispatch_request(request, ctx).await;
        if !pushed.success {
            let err = pushed.error.clone().unwrap_or_else(|| "unknown error".into());
            return CommandResult {
                data: json!({ "source": pulled, "sink": pushed }),
                ..CommandResult::failed(format!(
                    "Fetched {} data but sending to {} failed: {err}",
                    source.display_name, sink.display_name
                ))
            };
        }

        CommandResult::ok(json!({
            "source": pulled,
            "sink": pushed,
            "channel": channel,
            "summary": message,
        }))
        .with_message(format!("Sent {title} to #{channel}."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_phrase_with_source_and_sink() {
        let plan = detect_chain("Get shopify sales and send to slack #general").unwrap();
        assert_eq!(plan.source.name, "shopify");
        assert_eq!(plan.sink.name, "slack");
    }

    #[test]
    fn explicit_source_command_is_enough() {
        assert!(detect_chain("/shopify sales last week for slack").is_some());
        assert!(detect_chain("shopify get_sales into slack").is_some());
    }

    #[test]
    fn needs_both_ends() {
        assert!(detect_chain("send shopify sales to notion").is_none());
        assert!(detect_chain("post to slack #general hello").is_none());
        // Mentions both but asks for neither a pull nor a send.
        assert!(detect_chain("is shopify connected to slack?").is_none());
    }

    #[test]
    fn hashtag_wins() {
        assert_eq!(resolve_channel("send to slack channel ops #general", "x"), "general");
    }

    #[test]
    fn slack_channel_phrase() {
        assert_eq!(resolve_channel("post sales to the slack channel marketing", "x"), "marketing");
    }

    #[test]
    fn send_target_skips_service_names() {
        assert_eq!(resolve_channel("send shopify sales to slack", "general"), "general");
        assert_eq!(resolve_channel("share revenue to growth on slack", "general"), "growth");
    }

    #[test]
    fn in_target_skips_stopwords() {
        assert_eq!(resolve_channel("shopify sales in the last week in sales-team", "general"), "sales-team");
        assert_eq!(resolve_channel("shopify sales in slack", "general"), "general");
    }
}
