//! Deterministic `/service command args...` routing.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use switchboard_core::config::DEFAULT_CHANNEL;
use switchboard_core::services::{display_name, find_service};
use switchboard_core::types::Classification;

use crate::timewindow::TimeWindow;

pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_OFFSET: u64 = 0;
pub const DEFAULT_FORECAST_DAYS: u64 = 30;

/// Confidence of a recognized slash command.
const EXACT: f64 = 1.0;
/// Confidence of the help answer for an unknown command.
const UNKNOWN_COMMAND: f64 = 0.7;

/// A slash command split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    /// Canonical service name.
    pub service: String,
    /// Lowercased second token, empty for a bare `/service`.
    pub command: String,
    /// Remaining tokens joined by single spaces.
    pub args: String,
}

/// Split `raw` into a slash command. `None` unless it starts with `/`
/// followed by a known service name or alias.
pub fn parse_slash(raw: &str) -> Option<SlashCommand> {
    let rest = raw.trim().strip_prefix('/')?;
    let mut tokens = rest.split_whitespace();
    let spec = find_service(tokens.next()?)?;
    let command = tokens.next().unwrap_or_default().to_lowercase();
    let args = tokens.collect::<Vec<_>>().join(" ");
    Some(SlashCommand {
        service: spec.name.to_string(),
        command,
        args,
    })
}

/// How a command's arguments become parameters.
#[derive(Debug, Clone, Copy)]
enum Args {
    Plain,
    /// Time phrase in the args.
    Window,
    /// `limit` and `offset`.
    Paging,
    PagingWindow,
    /// First token under this key.
    Id(&'static str),
    /// First token, then `limit`.
    IdPaging(&'static str),
    /// Whole argument string under this key.
    Text(&'static str),
    /// First token under the first key, the rest under the second.
    IdText(&'static str, &'static str),
    /// Leading `#channel` (or the default channel), rest as `message`.
    ChannelMessage,
    /// Optional `#channel` plus `limit`.
    ChannelPaging,
    /// Optional `open|closed` status plus `limit`.
    StatusPaging,
    /// Forecast horizon in days.
    Days,
    /// Today's window regardless of args.
    Today,
}

struct CommandSpec {
    names: &'static [&'static str],
    intent: &'static str,
    args: Args,
}

const fn cmd(names: &'static [&'static str], intent: &'static str, args: Args) -> CommandSpec {
    CommandSpec {
        names,
        intent,
        args,
    }
}

const SHOPIFY: &[CommandSpec] = &[
    cmd(&["orders", "get_orders"], "get_orders", Args::PagingWindow),
    cmd(&["sales", "get_sales", "revenue"], "get_sales", Args::Window),
    cmd(&["order", "get_order"], "get_order", Args::Id("order_id")),
    cmd(&["products", "get_products"], "get_products", Args::Paging),
    cmd(&["customers", "get_customers"], "get_customers", Args::Paging),
    cmd(&["inventory"], "get_inventory", Args::Plain),
];

const SLACK: &[CommandSpec] = &[
    cmd(&["channels", "list"], "list_channels", Args::Plain),
    cmd(&["send", "post", "message"], "send_message", Args::ChannelMessage),
    cmd(&["read", "history", "messages"], "get_messages", Args::ChannelPaging),
    cmd(&["search"], "search_messages", Args::Text("query")),
];

const NOTION: &[CommandSpec] = &[
    cmd(&["databases", "dbs"], "list_databases", Args::Plain),
    cmd(&["search"], "search_pages", Args::Text("query")),
    cmd(&["create", "create_page", "new"], "create_page", Args::Text("title")),
    cmd(&["query"], "query_database", Args::Id("database_id")),
    cmd(&["page", "get_page"], "get_page", Args::Id("page_id")),
];

const KLAVIYO: &[CommandSpec] = &[
    cmd(&["campaigns"], "get_campaigns", Args::Plain),
    cmd(&["flows"], "get_flows", Args::Plain),
    cmd(&["metrics", "performance"], "get_metrics", Args::Window),
    cmd(&["lists"], "get_lists", Args::Plain),
    cmd(&["profiles"], "get_profiles", Args::Paging),
];

const POSTSCRIPT: &[CommandSpec] = &[
    cmd(&["campaigns"], "get_campaigns", Args::Plain),
    cmd(&["subscribers"], "get_subscribers", Args::Paging),
    cmd(&["keywords"], "get_keywords", Args::Plain),
    cmd(&["stats", "metrics"], "get_metrics", Args::Window),
];

const NORTHBEAM: &[CommandSpec] = &[
    cmd(&["attribution", "get_attribution"], "get_attribution", Args::Window),
    cmd(&["metrics", "performance"], "get_metrics", Args::Window),
    cmd(&["channels"], "get_channel_performance", Args::Window),
];

const TRIPLEWHALE: &[CommandSpec] = &[
    cmd(&["summary", "get_summary", "dashboard"], "get_summary", Args::Window),
    cmd(&["roas"], "get_roas", Args::Window),
    cmd(&["ads", "ad_spend", "spend"], "get_ad_spend", Args::Window),
];

const GORGIAS: &[CommandSpec] = &[
    cmd(&["tickets"], "get_tickets", Args::StatusPaging),
    cmd(&["ticket"], "get_ticket", Args::Id("ticket_id")),
    cmd(&["reply"], "reply_ticket", Args::IdText("ticket_id", "message")),
    cmd(&["customers"], "get_customers", Args::Plain),
];

const RECHARM: &[CommandSpec] = &[
    cmd(&["carts", "abandoned"], "get_abandoned_carts", Args::Window),
    cmd(&["recovered", "recoveries"], "get_recovered_carts", Args::Window),
    cmd(&["stats"], "get_stats", Args::Window),
];

const PRESCIENT: &[CommandSpec] = &[
    cmd(&["forecast"], "get_forecast", Args::Days),
    cmd(&["models", "mmm"], "get_models", Args::Plain),
    cmd(&["recommendations", "budget"], "get_recommendations", Args::Plain),
];

const ELEVAR: &[CommandSpec] = &[
    cmd(&["status", "health"], "get_tracking_status", Args::Plain),
    cmd(&["events"], "get_events", Args::Window),
    cmd(&["errors"], "get_errors", Args::Window),
];

const GITHUB: &[CommandSpec] = &[
    cmd(&["repos"], "list_repos", Args::Plain),
    cmd(&["issues"], "list_issues", Args::Id("repo")),
    cmd(&["prs", "pulls", "pull_requests"], "list_pull_requests", Args::Id("repo")),
    cmd(&["create_issue", "issue"], "create_issue", Args::IdText("repo", "title")),
    cmd(&["commits"], "list_commits", Args::IdPaging("repo")),
];

const CALENDAR: &[CommandSpec] = &[
    cmd(&["events", "agenda", "upcoming"], "list_events", Args::Window),
    cmd(&["today"], "list_events", Args::Today),
    cmd(&["create", "schedule"], "create_event", Args::Text("summary")),
    cmd(&["free", "availability"], "find_free_time", Args::Window),
];

const ASANA: &[CommandSpec] = &[
    cmd(&["tasks"], "list_tasks", Args::Plain),
    cmd(&["projects"], "list_projects", Args::Plain),
    cmd(&["create", "create_task", "add"], "create_task", Args::Text("name")),
    cmd(&["complete", "done"], "complete_task", Args::Id("task_id")),
];

const DRIVE: &[CommandSpec] = &[
    cmd(&["files", "list"], "list_files", Args::Paging),
    cmd(&["search"], "search_files", Args::Text("query")),
    cmd(&["file", "get"], "get_file", Args::Id("file_id")),
];

const FIGMA: &[CommandSpec] = &[
    cmd(&["files", "projects"], "list_files", Args::Plain),
    cmd(&["file"], "get_file", Args::Id("file_key")),
    cmd(&["comments"], "get_comments", Args::Id("file_key")),
    cmd(&["components"], "get_components", Args::Id("file_key")),
];

/// Per-service command table; the first entry is what a bare `/service`
/// runs.
fn commands(service: &str) -> &'static [CommandSpec] {
    match service {
        "shopify" => SHOPIFY,
        "slack" => SLACK,
        "notion" => NOTION,
        "klaviyo" => KLAVIYO,
        "postscript" => POSTSCRIPT,
        "northbeam" => NORTHBEAM,
        "triplewhale" => TRIPLEWHALE,
        "gorgias" => GORGIAS,
        "recharm" => RECHARM,
        "prescient" => PRESCIENT,
        "elevar" => ELEVAR,
        "github" => GITHUB,
        "calendar" => CALENDAR,
        "asana" => ASANA,
        "drive" => DRIVE,
        "figma" => FIGMA,
        _ => &[],
    }
}

/// Turns parsed slash commands into classifications.
#[derive(Debug, Clone)]
pub struct SlashClassifier {
    default_channel: String,
}

impl Default for SlashClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL)
    }
}

impl SlashClassifier {
    pub fn new(default_channel: impl Into<String>) -> Self {
        Self {
            default_channel: default_channel.into(),
        }
    }

    /// `None` only for services with no command table.
    pub fn classify(&self, cmd: &SlashCommand, now: DateTime<Utc>) -> Option<Classification> {
        let table = commands(&cmd.service);
        let first = table.first()?;

        if cmd.command == "help" {
            return Some(Classification::new("help", cmd.service.as_str(), EXACT));
        }

        let (spec, args) = if cmd.command.is_empty() {
            (first, "")
        } else {
            match table.iter().find(|c| c.names.contains(&cmd.command.as_str())) {
                Some(spec) => (spec, cmd.args.as_str()),
                None => {
                    return Some(
                        Classification::new("help", cmd.service.as_str(), UNKNOWN_COMMAND)
                            .with_param("command", cmd.command.as_str()),
                    );
                }
            }
        };

        let mut c = Classification::new(spec.intent, cmd.service.as_str(), EXACT);
        self.fill_params(spec.args, args, now, &mut c.parameters);
        Some(c)
    }

    fn fill_params(&self, kind: Args, args: &str, now: DateTime<Utc>, params: &mut Map<String, Value>) {
        let mut tokens = args.split_whitespace();
        match kind {
            Args::Plain => {}
            Args::Window => apply_window(args, now, params),
            Args::Paging => paging(args, params),
            Args::PagingWindow => {
                paging(args, params);
                apply_window(args, now, params);
            }
            Args::Id(key) => {
                if let Some(id) = tokens.next() {
                    params.insert(key.into(), Value::String(clean_id(id)));
                }
            }
            Args::IdPaging(key) => {
                if let Some(id) = tokens.next() {
                    params.insert(key.into(), Value::String(clean_id(id)));
                }
                let rest = tokens.collect::<Vec<_>>().join(" ");
                paging(&rest, params);
            }
            Args::Text(key) => {
                if !args.is_empty() {
                    params.insert(key.into(), Value::String(args.to_string()));
                }
            }
            Args::IdText(id_key, text_key) => {
                if let Some(id) = tokens.next() {
                    params.insert(id_key.into(), Value::String(clean_id(id)));
                }
                let rest = tokens.collect::<Vec<_>>().join(" ");
                if !rest.is_empty() {
                    params.insert(text_key.into(), Value::String(rest));
                }
            }
            Args::ChannelMessage => {
                let (channel, rest) = split_channel(args);
                let channel = channel.unwrap_or(&self.default_channel);
                params.insert("channel".into(), Value::String(channel.to_string()));
                params.insert("message".into(), Value::String(rest.to_string()));
            }
            Args::ChannelPaging => {
                let (channel, rest) = split_channel(args);
                let channel = channel.unwrap_or(&self.default_channel);
                params.insert("channel".into(), Value::String(channel.to_string()));
                paging(rest, params);
            }
            Args::StatusPaging => {
                let lower = args.to_lowercase();
                if let Some(status) = lower
                    .split_whitespace()
                    .find(|t| *t == "open" || *t == "closed")
                {
                    params.insert("status".into(), Value::String(status.to_string()));
                }
                paging(args, params);
            }
            Args::Days => {
                let days = first_number(args)
                    .filter(|d| *d > 0)
                    .unwrap_or(DEFAULT_FORECAST_DAYS);
                params.insert("days".into(), Value::from(days));
            }
            Args::Today => {
                if let Some(w) = TimeWindow::parse("today", now) {
                    w.apply(params);
                }
            }
        }
    }
}

/// Classify with the default channel.
pub fn classify_slash(cmd: &SlashCommand, now: DateTime<Utc>) -> Option<Classification> {
    SlashClassifier::default().classify(cmd, now)
}

fn apply_window(args: &str, now: DateTime<Utc>, params: &mut Map<String, Value>) {
    if let Some(w) = TimeWindow::parse(args, now) {
        w.apply(params);
    }
}

/// `limit` is the first bare number (default 10, must be positive);
/// `offset` follows the word `offset` (default 0).
fn paging(args: &str, params: &mut Map<String, Value>) {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let offset = tokens
        .windows(2)
        .find(|w| w[0].eq_ignore_ascii_case("offset"))
        .and_then(|w| w[1].parse::<u64>().ok())
        .unwrap_or(DEFAULT_OFFSET);
    let limit = tokens
        .iter()
        .enumerate()
        .filter(|(i, _)| *i == 0 || !tokens[*i - 1].eq_ignore_ascii_case("offset"))
        .find_map(|(i, t)| {
            // Numbers inside a time phrase ("last 7 days") are not limits.
            let in_phrase = i > 0
                && matches!(tokens[i - 1].to_lowercase().as_str(), "last" | "past");
            (!in_phrase).then(|| t.parse::<u64>().ok()).flatten()
        })
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_LIMIT);
    params.insert("limit".into(), Value::from(limit));
    params.insert("offset".into(), Value::from(offset));
}

fn first_number(args: &str) -> Option<u64> {
    args.split_whitespace().find_map(|t| t.parse().ok())
}

/// Ids are passed through without a leading `#` (order `#1001`).
fn clean_id(token: &str) -> String {
    token.trim_start_matches('#').to_string()
}

/// Leading `#channel` token and the remaining text.
fn split_channel(args: &str) -> (Option<&str>, &str) {
    let args = args.trim();
    match args.strip_prefix('#') {
        Some(rest) => {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let channel = &rest[..end];
            let remainder = rest[end..].trim_start();
            if channel.is_empty() {
                (None, remainder)
            } else {
                (Some(channel), remainder)
            }
        }
        None => (None, args),
    }
}

/// Command reference for one service.
pub fn help_text(service: &str) -> String {
    let table = commands(service);
    if table.is_empty() {
        return format!("No slash commands are available for {service}.");
    }
    let mut out = format!("{} commands:", display_name(service));
    for spec in table {
        out.push_str(&format!("\n/{service} {}", spec.names.join("|")));
    }
    out.push_str(&format!("\n/{service} help"));
    out
}
