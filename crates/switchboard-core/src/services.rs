//! Registered services table.
//!
//! Every parser, detector and dispatcher resolves service names through this
//! one table, so adding a service means adding one entry here.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Conversational fallback: handles anything no specific service claims.
pub const ASSISTANT: &str = "assistant";
/// Sink for classifier failures.
pub const SYSTEM: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Commerce,
    Messaging,
    Docs,
    SmsMarketing,
    EmailMarketing,
    Attribution,
    Analytics,
    Helpdesk,
    CartRecovery,
    Forecasting,
    Tracking,
    SourceControl,
    Calendar,
    Tasks,
    FileStorage,
    Design,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ServiceSpec {
    /// Canonical lowercase name used in classifications and dispatch.
    pub name: &'static str,
    pub display_name: &'static str,
    /// Extra tokens accepted after `/` besides `name`.
    pub aliases: &'static [&'static str],
    /// Lowercase phrases that mark the service as mentioned in free text.
    pub keywords: &'static [&'static str],
    pub category: ServiceCategory,
    /// Intent used to pull data when the service is the source of a chain.
    pub source_intent: Option<&'static str>,
    /// Whether the service can receive the output of a chain.
    pub sink: bool,
}

impl ServiceSpec {
    pub fn is_source(&self) -> bool {
        self.source_intent.is_some()
    }
}

pub static SERVICES: &[ServiceSpec] = &[
    ServiceSpec {
        name: "shopify",
        display_name: "Shopify",
        aliases: &[],
        keywords: &["shopify"],
        category: ServiceCategory::Commerce,
        source_intent: Some("get_sales"),
        sink: false,
    },
    ServiceSpec {
        name: "slack",
        display_name: "Slack",
        aliases: &[],
        keywords: &["slack"],
        category: ServiceCategory::Messaging,
        source_intent: None,
        sink: true,
    },
    ServiceSpec {
        name: "notion",
        display_name: "Notion",
        aliases: &[],
        keywords: &["notion"],
        category: ServiceCategory::Docs,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "klaviyo",
        display_name: "Klaviyo",
        aliases: &[],
        keywords: &["klaviyo"],
        category: ServiceCategory::EmailMarketing,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "postscript",
        display_name: "Postscript",
        aliases: &[],
        keywords: &["postscript"],
        category: ServiceCategory::SmsMarketing,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "northbeam",
        display_name: "Northbeam",
        aliases: &[],
        keywords: &["northbeam"],
        category: ServiceCategory::Attribution,
        source_intent: Some("get_attribution"),
        sink: false,
    },
    ServiceSpec {
        name: "triplewhale",
        display_name: "Triple Whale",
        aliases: &["triple_whale", "triple-whale", "tw"],
        keywords: &["triplewhale", "triple whale", "triple_whale"],
        category: ServiceCategory::Analytics,
        source_intent: Some("get_summary"),
        sink: false,
    },
    ServiceSpec {
        name: "gorgias",
        display_name: "Gorgias",
        aliases: &[],
        keywords: &["gorgias"],
        category: ServiceCategory::Helpdesk,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "recharm",
        display_name: "Recharm",
        aliases: &[],
        keywords: &["recharm"],
        category: ServiceCategory::CartRecovery,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "prescient",
        display_name: "Prescient AI",
        aliases: &["prescient_ai", "prescient-ai"],
        keywords: &["prescient", "prescient ai"],
        category: ServiceCategory::Forecasting,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "elevar",
        display_name: "Elevar",
        aliases: &[],
        keywords: &["elevar"],
        category: ServiceCategory::Tracking,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "github",
        display_name: "GitHub",
        aliases: &["gh"],
        keywords: &["github"],
        category: ServiceCategory::SourceControl,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "calendar",
        display_name: "Google Calendar",
        aliases: &["google_calendar", "gcal"],
        keywords: &["calendar", "google calendar", "gcal"],
        category: ServiceCategory::Calendar,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "asana",
        display_name: "Asana",
        aliases: &[],
        keywords: &["asana"],
        category: ServiceCategory::Tasks,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "drive",
        display_name: "Google Drive",
        aliases: &["google_drive", "gdrive"],
        keywords: &["google drive", "gdrive"],
        category: ServiceCategory::FileStorage,
        source_intent: None,
        sink: false,
    },
    ServiceSpec {
        name: "figma",
        display_name: "Figma",
        aliases: &[],
        keywords: &["figma"],
        category: ServiceCategory::Design,
        source_intent: None,
        sink: false,
    },
];

/// Resolve a slash token or model-supplied name to its registry entry.
/// Case-insensitive; accepts the canonical name or any alias.
pub fn find_service(token: &str) -> Option<&'static ServiceSpec> {
    let lower = token.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    SERVICES
        .iter()
        .find(|s| s.name == lower || s.aliases.contains(&lower.as_str()))
}

pub fn is_known_service(name: &str) -> bool {
    find_service(name).is_some()
}

/// Display name for a service, falling back to the raw name.
pub fn display_name(name: &str) -> &str {
    match find_service(name) {
        Some(spec) => spec.display_name,
        None => name,
    }
}

/// Services mentioned in free text, in registry order, each at most once.
pub fn mentioned_services(text: &str) -> Vec<&'static ServiceSpec> {
    SERVICES
        .iter()
        .zip(KEYWORD_PATTERNS.iter())
        .filter(|(_, pattern)| matches!(pattern, Some(p) if p.is_match(text)))
        .map(|(spec, _)| spec)
        .collect()
}

/// One pattern per `SERVICES` entry, same order.
static KEYWORD_PATTERNS: LazyLock<Vec<Option<Regex>>> =
    LazyLock::new(|| SERVICES.iter().map(|s| keyword_pattern(s.keywords)).collect());

/// Case-insensitive, word-bounded alternation of `words`. `None` when
/// there is nothing to look for.
pub fn keyword_pattern(words: &[&str]) -> Option<Regex> {
    let alternatives = words
        .iter()
        .filter(|w| !w.is_empty())
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    if alternatives.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).ok()
}
