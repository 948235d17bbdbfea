//! Deterministic, LLM-free summaries of structured service results.
//!
//! Used when the narrative model cannot take the payload (too large, or the
//! provider rejected it) and by chained commands that post a plain-text
//! digest to a messaging channel.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use switchboard_core::types::CommandResult;

/// Fields that hold a monetary amount, in lookup order.
const MONEY_FIELDS: &[&str] = &[
    "total_price",
    "totalPrice",
    "total",
    "amount",
    "revenue",
    "sales",
    "total_sales",
    "price",
    "spend",
    "value",
];

/// Fields that hold a timestamp, in lookup order.
const DATE_FIELDS: &[&str] = &[
    "created_at",
    "createdAt",
    "processed_at",
    "date",
    "timestamp",
    "updated_at",
];

/// Fields that make a readable label for one record.
const LABEL_FIELDS: &[&str] = &["name", "title", "order_number", "number", "channel", "id"];

/// Aggregate view of the main record list inside a result.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummary {
    /// Key the list was found under (`items` for a bare array).
    pub key: String,
    pub count: usize,
    /// Sum of the monetary field across all records, if any record had one.
    pub total: Option<f64>,
    /// Label of the record with the latest timestamp.
    pub most_recent: Option<String>,
}

impl RecordSummary {
    pub fn render(&self) -> String {
        let mut out = format!("{} {}", self.count, self.key);
        if let Some(total) = self.total {
            out.push_str(&format!(", total {}", format_amount(total)));
        }
        if let Some(recent) = &self.most_recent {
            out.push_str(&format!(". Most recent: {recent}"));
        }
        out.push('.');
        out
    }
}

/// Locate the main list of records in a payload: the value itself when it
/// is an array, otherwise the longest array among its fields (searched one
/// level deep).
pub fn find_records(data: &Value) -> Option<(String, &Vec<Value>)> {
    match data {
        Value::Array(items) => Some(("items".to_string(), items)),
        Value::Object(map) => {
            let direct = map
                .iter()
                .filter_map(|(k, v)| v.as_array().map(|a| (k.clone(), a)))
                .max_by_key(|(_, a)| a.len());
            if direct.is_some() {
                return direct;
            }
            map.values()
                .filter(|v| v.is_object())
                .filter_map(find_records)
                .max_by_key(|(_, a)| a.len())
        }
        _ => None,
    }
}

/// Summarize the main record list, computed over every record.
pub fn summarize_records(data: &Value) -> Option<RecordSummary> {
    let (key, records) = find_records(data)?;

    let amounts: Vec<f64> = records.iter().filter_map(record_amount).collect();
    let total = if amounts.is_empty() {
        None
    } else {
        Some(amounts.iter().sum())
    };

    let most_recent = records
        .iter()
        .filter_map(|r| record_date(r).map(|d| (d, r)))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, r)| record_label(r));

    Some(RecordSummary {
        key,
        count: records.len(),
        total,
        most_recent,
    })
}

/// Monetary value of one record, accepting numbers and numeric strings.
pub fn record_amount(record: &Value) -> Option<f64> {
    let obj = record.as_object()?;
    MONEY_FIELDS
        .iter()
        .filter_map(|f| obj.get(*f))
        .find_map(as_number)
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Sort key for recency. RFC 3339 timestamps are compared as instants;
/// anything else falls back to string order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum DateKey {
    Text(String),
    Instant(DateTime<FixedOffset>),
}

fn record_date(record: &Value) -> Option<DateKey> {
    let obj = record.as_object()?;
    let raw = DATE_FIELDS
        .iter()
        .filter_map(|f| obj.get(*f))
        .find_map(|v| v.as_str())?;
    Some(match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => DateKey::Instant(dt),
        Err(_) => DateKey::Text(raw.to_string()),
    })
}

/// Short human label for one record.
pub fn record_label(record: &Value) -> String {
    let Some(obj) = record.as_object() else {
        return scalar_text(record);
    };
    let name = LABEL_FIELDS
        .iter()
        .filter_map(|f| obj.get(*f))
        .map(scalar_text)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "record".to_string());
    match record_amount(record) {
        Some(amount) => format!("{name} ({})", format_amount(amount)),
        None => name,
    }
}

fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn format_amount(amount: f64) -> String {
    format!("${amount:.2}")
}

/// Deterministic answer for a command result, built without the model.
pub fn local_summary(result: &CommandResult) -> String {
    if !result.success {
        let reason = result.error.as_deref().unwrap_or("unknown error");
        return format!("The request could not be completed: {reason}");
    }
    let mut out = String::new();
    if let Some(msg) = &result.message {
        out.push_str(msg);
    }
    let body = match summarize_records(&result.data) {
        Some(summary) => summary.render(),
        None => scalar_fields(&result.data),
    };
    if !body.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&body);
    }
    if out.is_empty() {
        out.push_str("Done.");
    }
    out
}

/// `key: value` lines for the top-level scalars of an object.
fn scalar_fields(data: &Value) -> String {
    match data {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_object() && !v.is_array() && !v.is_null())
            .map(|(k, v)| format!("{k}: {}", scalar_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => scalar_text(other),
    }
}

/// Plain-text digest for chained commands: heading, count, total, the
/// first `preview` records and an "...and N more" line for the rest.
pub fn text_digest(title: &str, data: &Value, preview: usize) -> String {
    let mut lines = vec![title.to_string()];

    let Some((key, records)) = find_records(data) else {
        let fields = scalar_fields(data);
        if !fields.is_empty() {
            lines.push(fields);
        }
        return lines.join("\n");
    };

    lines.push(format!("{}: {}", capitalize(&key), records.len()));
    let amounts: Vec<f64> = records.iter().filter_map(record_amount).collect();
    if !amounts.is_empty() {
        lines.push(format!("Total: {}", format_amount(amounts.iter().sum())));
    }
    for (i, record) in records.iter().take(preview).enumerate() {
        lines.push(format!("{}. {}", i + 1, record_label(record)));
    }
    if records.len() > preview {
        lines.push(format!("...and {} more", records.len() - preview));
    }
    lines.join("\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders(n: usize) -> Value {
        let list: Vec<Value> = (1..=n)
            .map(|i| {
                json!({
                    "id": i,
                    "name": format!("#{}", 1000 + i),
                    "total_price": format!("{}.50", i),
                    "created_at": format!("2024-03-{:02}T10:00:00Z", i.min(28)),
                })
            })
            .collect();
        json!({ "orders": list, "shop": "demo" })
    }

    #[test]
    fn summarizes_every_record() {
        let s = summarize_records(&orders(4)).unwrap();
        assert_eq!(s.key, "orders");
        assert_eq!(s.count, 4);
        // 1.5 + 2.5 + 3.5 + 4.5
        assert_eq!(s.total, Some(12.0));
        assert_eq!(s.most_recent.as_deref(), Some("#1004 ($4.50)"));
    }

    #[test]
    fn finds_nested_lists() {
        let data = json!({ "data": { "products": [{"title": "Mug"}] } });
        let (key, list) = find_records(&data).unwrap();
        assert_eq!(key, "products");
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn local_summary_reports_failure_reason() {
        let r = CommandResult::failed("token expired");
        assert!(local_summary(&r).contains("token expired"));
    }

    #[test]
    fn local_summary_falls_back_to_scalars() {
        let r = CommandResult::ok(json!({ "total_sales": 1234.5, "currency": "USD" }));
        let s = local_summary(&r);
        assert!(s.contains("total_sales: 1234.5"));
        assert!(s.contains("currency: USD"));
    }

    #[test]
    fn digest_lists_preview_and_remainder() {
        let d = text_digest("Shopify sales (last 7 days)", &orders(8), 5);
        assert!(d.starts_with("Shopify sales (last 7 days)\nOrders: 8"));
        assert!(d.contains("5. #1005"));
        assert!(!d.contains("6. #1006"));
        assert!(d.ends_with("...and 3 more"));
    }

    #[test]
    fn digest_without_overflow_has_no_suffix() {
        let d = text_digest("t", &orders(2), 5);
        assert!(!d.contains("more"));
        assert!(d.contains("Total: $4.00"));
    }
}
