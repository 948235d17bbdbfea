//! Natural-language time ranges ("today", "last 7 days", "last month").

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Map, Value};

/// A resolved `[start, end)` range with the phrase it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Normalized phrase, e.g. `"last 7 days"`.
    pub label: String,
    pub today: bool,
}

static ROLLING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:last|past)\s+(\d{1,4})\s+(day|week|month)s?\b").expect("valid regex")
});
static THIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bthis\s+(week|month|year)\b").expect("valid regex"));
static LAST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blast\s+(week|month|year)\b").expect("valid regex"));
static TODAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btoday\b").expect("valid regex"));
static YESTERDAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\byesterday\b").expect("valid regex"));

fn start_of_day(d: NaiveDate) -> DateTime<Utc> {
    d.and_time(NaiveTime::MIN).and_utc()
}

fn first_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1).map(start_of_day)
}

impl TimeWindow {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
            today: false,
        }
    }

    /// Find the first time phrase in `text`. Phrases are tried in a fixed
    /// order; the first kind that matches wins.
    pub fn parse(text: &str, now: DateTime<Utc>) -> Option<Self> {
        let today = now.date_naive();

        if TODAY.is_match(text) {
            return Some(Self {
                today: true,
                ..Self::new(start_of_day(today), now, "today")
            });
        }

        if YESTERDAY.is_match(text) {
            let y = today.pred_opt()?;
            return Some(Self::new(start_of_day(y), start_of_day(today), "yesterday"));
        }

        if let Some(caps) = ROLLING.captures(text) {
            let n: u32 = caps[1].parse().ok()?;
            let unit = caps[2].to_lowercase();
            return Self::rolling(n, &unit, now);
        }

        if let Some(caps) = THIS.captures(text) {
            let unit = caps[1].to_lowercase();
            let start = match unit.as_str() {
                "week" => {
                    let back = today.weekday().num_days_from_monday() as i64;
                    start_of_day(today - Duration::days(back))
                }
                "month" => first_of_month(today.year(), today.month())?,
                _ => first_of_month(today.year(), 1)?,
            };
            return Some(Self::new(start, now, format!("this {unit}")));
        }

        if let Some(caps) = LAST.captures(text) {
            let unit = caps[1].to_lowercase();
            let (start, end) = match unit.as_str() {
                "week" => {
                    let back = today.weekday().num_days_from_monday() as i64;
                    let this_monday = start_of_day(today - Duration::days(back));
                    (this_monday - Duration::days(7), this_monday)
                }
                "month" => {
                    let this_month = first_of_month(today.year(), today.month())?;
                    (this_month.checked_sub_months(Months::new(1))?, this_month)
                }
                _ => (
                    first_of_month(today.year() - 1, 1)?,
                    first_of_month(today.year(), 1)?,
                ),
            };
            return Some(Self::new(start, end, format!("last {unit}")));
        }

        None
    }

    /// Rolling window ending now: starts at midnight `n` units ago.
    pub fn rolling(n: u32, unit: &str, now: DateTime<Utc>) -> Option<Self> {
        let anchor = match unit {
            "day" => now.checked_sub_signed(Duration::days(n as i64))?,
            "week" => now.checked_sub_signed(Duration::weeks(n as i64))?,
            "month" => now.checked_sub_months(Months::new(n))?,
            _ => return None,
        };
        let label = if n == 1 {
            format!("last 1 {unit}")
        } else {
            format!("last {n} {unit}s")
        };
        Some(Self::new(start_of_day(anchor.date_naive()), now, label))
    }

    /// The `last N days` window.
    pub fn last_days(n: u32, now: DateTime<Utc>) -> Self {
        Self::rolling(n, "day", now)
            .unwrap_or_else(|| Self::new(start_of_day(now.date_naive()), now, "today"))
    }

    /// Write `start_date`, `end_date` and `time_period` into `params`, plus
    /// `today: true` for the today window.
    pub fn apply(&self, params: &mut Map<String, Value>) {
        params.insert(
            "start_date".into(),
            Value::String(self.start.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        params.insert(
            "end_date".into(),
            Value::String(self.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        params.insert("time_period".into(), Value::String(self.label.clone()));
        if self.today {
            params.insert("today".into(), Value::Bool(true));
        }
    }
}
