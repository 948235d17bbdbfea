use chrono::{DateTime, Utc};
use switchboard_core::services::{ASSISTANT, SERVICES};

/// System prompt for the conversational fallback.
pub const ASSISTANT_PROMPT: &str = concat!(
    "You are Switchboard, an operations assistant for an e-commerce team. ",
    "Answer the user's question directly and concisely. ",
    "If the question needs live data from a connected service, say which ",
    "service command would fetch it (for example `/shopify sales today`)."
);

/// System prompt for turning structured service results into prose.
pub const RESPONDER_PROMPT: &str = concat!(
    "You turn structured JSON results from business tools into a short, ",
    "friendly answer for the user who issued the command. ",
    "Lead with the number or outcome they asked for. ",
    "Use plain text or light markdown. Never invent values that are not in the data. ",
    "If a field ending in `_summary` says items were omitted, mention that the list is partial. ",
    "If the result reports a failure, explain it plainly and suggest a next step."
);

/// System prompt for text-mode charts.
pub const VISUALIZER_PROMPT: &str = concat!(
    "You render data as a compact text chart inside a markdown code block ",
    "(horizontal bars built from block characters, one row per item, value at the end). ",
    "Add a one-line title above the block and one line with the total below it. ",
    "Use only the values present in the data."
);

/// Output shape the classifier prompt asks for.
const CLASSIFIER_SCHEMA: &str = r#"{"intent":"snake_case_action","primaryService":"service","secondaryServices":["service"],"parameters":{},"confidence":0.0}"#;

/// Build the routing prompt. The service list comes from the registry so
/// the model only ever sees canonical names; the timestamp goes last since
/// it is the only part that changes between calls.
pub fn classifier_prompt(now: DateTime<Utc>) -> String {
    let mut out = String::from(concat!(
        "You route commands for a business operations assistant. ",
        "Classify the user's command and reply with ONLY a JSON object of the form:\n"
    ));
    out.push_str(CLASSIFIER_SCHEMA);
    out.push_str("\n\nAvailable services:\n");
    for spec in SERVICES {
        out.push_str("- ");
        out.push_str(spec.name);
        out.push_str(" (");
        out.push_str(spec.display_name);
        out.push_str(")\n");
    }
    out.push_str(&format!(
        "- {ASSISTANT} (general questions that need no connected service)\n"
    ));
    out.push_str(concat!(
        "\nRules:\n",
        "1. If no service is named or clearly implied, use primaryService \"assistant\" and intent \"chat\".\n",
        "2. If several services are mentioned, pick the main one as primaryService and list EVERY other one in secondaryServices.\n",
        "3. If the command mentions \"today\", set parameters.today = true and parameters.time_period = \"today\".\n",
        "4. Put time ranges like \"last 7 days\" in parameters.time_period verbatim.\n",
        "5. confidence is a number between 0 and 1.\n",
    ));
    out.push_str(&format!(
        "\nCurrent time (UTC): {}",
        now.format("%Y-%m-%d %H:%M")
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn classifier_prompt_lists_every_service() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        let p = classifier_prompt(now);
        for spec in SERVICES {
            assert!(p.contains(&format!("- {} (", spec.name)), "missing {}", spec.name);
        }
        assert!(p.contains("- assistant"));
        assert!(p.ends_with("2024-03-05 09:30"));
    }
}
