//! Multi-service detection and other keyword predicates over raw text.

use std::sync::LazyLock;

use regex::Regex;

use switchboard_core::services::{is_known_service, mentioned_services, ServiceSpec};
use switchboard_core::types::Classification;

/// Model confidence above which its own secondary list is trusted.
const SECONDARY_TRUST: f64 = 0.5;

static VISUALIZATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:chart|graph|plot|visuali[sz](?:e|ation))\b").expect("valid regex")
});
static CHART_STYLES: LazyLock<[(&'static str, Regex); 3]> = LazyLock::new(|| {
    ["line", "pie", "bar"].map(|t| (t, Regex::new(&format!(r"(?i)\b{t}\b")).expect("valid regex")))
});

/// Decide whether a free-text command should fan out to several services.
///
/// Returns the (possibly extended) classification and the verdict. Fans
/// out when the classifier already named confident secondaries, or when
/// the text mentions more than one registered service; in the latter case
/// every extra mention is added as a secondary. Applying it twice gives
/// the same result.
pub fn enrich(c: Classification, raw: &str) -> (Classification, bool) {
    let mentioned = mentioned_services(raw);
    let c = match declared(c, &mentioned) {
        Ok(fan_out) => return (fan_out, true),
        Err(c) => c,
    };
    if mentioned.len() <= 1 {
        return (c, false);
    }

    let mut c = c;
    promote_primary(&mut c, &mentioned);
    for spec in &mentioned {
        if spec.name != c.primary_service && !c.secondary_services.iter().any(|s| s == spec.name) {
            c.secondary_services.push(spec.name.to_string());
        }
    }
    (c.normalized(), true)
}

/// Fan-out for a slash command. The command names exactly one service, so
/// words in its arguments never add services; only secondaries already on
/// the classification count.
pub fn enrich_slash(c: Classification) -> (Classification, bool) {
    match declared(c, &[]) {
        Ok(fan_out) => (fan_out, true),
        Err(c) => (c, false),
    }
}

/// `Ok` with the fan-out when the classification carries trusted
/// secondaries that remain after promoting a service to primary.
fn declared(c: Classification, mentioned: &[&ServiceSpec]) -> Result<Classification, Classification> {
    let mut c = c.normalized();
    if c.secondary_services.is_empty() || c.confidence <= SECONDARY_TRUST {
        return Err(c);
    }
    promote_primary(&mut c, mentioned);
    let c = c.normalized();
    if c.secondary_services.is_empty() {
        Err(c)
    } else {
        Ok(c)
    }
}

/// A non-service primary (assistant, system) gives way to the first
/// mentioned service, else to the first known secondary.
fn promote_primary(c: &mut Classification, mentioned: &[&ServiceSpec]) {
    if is_known_service(&c.primary_service) {
        return;
    }
    let pick = mentioned
        .first()
        .map(|spec| spec.name.to_string())
        .or_else(|| {
            c.secondary_services
                .iter()
                .find(|s| is_known_service(s))
                .cloned()
        });
    if let Some(primary) = pick {
        c.primary_service = primary;
    }
}

/// True when the command asks for a chart.
pub fn wants_visualization(raw: &str) -> bool {
    VISUALIZATION.is_match(raw)
}

/// Chart style named in the command, `bar` when none is.
pub fn chart_type(raw: &str) -> &'static str {
    CHART_STYLES
        .iter()
        .find(|(_, pattern)| pattern.is_match(raw))
        .map_or("bar", |(t, _)| *t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::services::ASSISTANT;

    #[test]
    fn confident_secondaries_trigger_fan_out() {
        let mut c = Classification::new("get_summary", "shopify", 0.9);
        c.secondary_services = vec!["klaviyo".into()];
        let (out, multi) = enrich(c.clone(), "how are we doing");
        assert!(multi);
        assert_eq!(out, c);
    }

    #[test]
    fn low_confidence_secondaries_need_mentions() {
        let mut c = Classification::new("get_summary", "shopify", 0.4);
        c.secondary_services = vec!["klaviyo".into()];
        let (_, multi) = enrich(c, "how are we doing");
        assert!(!multi);
    }

    #[test]
    fn keyword_scan_extends_secondaries() {
        let c = Classification::new("get_summary", "shopify", 0.4);
        let (out, multi) = enrich(c, "Compare Shopify, Klaviyo and triple whale numbers");
        assert!(multi);
        assert_eq!(out.primary_service, "shopify");
        assert_eq!(out.secondary_services, vec!["klaviyo", "triplewhale"]);
    }

    #[test]
    fn assistant_primary_is_replaced_by_first_mention() {
        let c = Classification::new("chat", ASSISTANT, 0.3);
        let (out, multi) = enrich(c, "notion and asana status");
        assert!(multi);
        assert_eq!(out.primary_service, "notion");
        assert_eq!(out.secondary_services, vec!["asana"]);
    }

    #[test]
    fn single_mention_is_not_multi() {
        let c = Classification::new("get_sales", "shopify", 0.9);
        let (out, multi) = enrich(c.clone(), "shopify sales today");
        assert!(!multi);
        assert_eq!(out, c);
    }

    #[test]
    fn enrich_is_idempotent() {
        let raw = "pull northbeam and shopify and post in slack";
        let c = Classification::new("get_attribution", "northbeam", 0.2);
        let once = enrich(c, raw);
        let twice = enrich(once.0.clone(), raw);
        assert_eq!(once, twice);
    }

    #[test]
    fn confident_secondaries_replace_assistant_primary() {
        let mut c = Classification::new("get_summary", ASSISTANT, 0.9);
        c.secondary_services = vec!["notion".into(), "asana".into()];
        let (out, multi) = enrich(c, "how are things going");
        assert!(multi);
        assert_eq!(out.primary_service, "notion");
        assert_eq!(out.secondary_services, vec!["asana"]);
    }

    #[test]
    fn mentioned_service_wins_over_secondary_for_primary() {
        let mut c = Classification::new("get_summary", ASSISTANT, 0.9);
        c.secondary_services = vec!["notion".into(), "asana".into()];
        let (out, _) = enrich(c, "is asana behind?");
        assert_eq!(out.primary_service, "asana");
        assert_eq!(out.secondary_services, vec!["notion"]);
    }

    #[test]
    fn slash_commands_ignore_mentions_in_arguments() {
        let c = Classification::new("send_message", "slack", 1.0);
        let (out, multi) = enrich_slash(c.clone());
        assert!(!multi);
        assert_eq!(out, c);
        // The free-text path would have fanned out on the same words.
        assert!(enrich(c, "/slack send #general shopify launch went well").1);
    }

    #[test]
    fn visualization_keywords() {
        assert!(wants_visualization("Chart my sales"));
        assert!(wants_visualization("visualize revenue"));
        assert!(!wants_visualization("graphql errors"));
        assert_eq!(chart_type("line graph of sales"), "line");
        assert_eq!(chart_type("chart it"), "bar");
    }
}
