use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::NormalizeError;

// above this: epoch milliseconds
const EPOCH_MILLIS_THRESHOLD: i64 = 9_999_999_999;
const DISPLAY_FORMAT: &str = "%b %-d, %Y, %H:%M";
static UNKNOWN: &str = "Unknown";
static ACTIVE_SUFFIX: &str = " (active)";

static DATETIME_LAYOUTS: [&str; 9] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%a %b %e %H:%M:%S %Y",
    "%b %d %Y %H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
static ZONED_LAYOUTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S%.f %z"];
static DATE_LAYOUTS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%b %d, %Y"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTimestamp {
    pub text: String,
    pub instant: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl ParsedTimestamp {
    fn unknown() -> Self {
        Self {
            text: UNKNOWN.to_string(),
            instant: None,
            is_active: false,
        }
    }
}

fn still_re() -> &'static Regex {
    static STILL_RE: OnceLock<Regex> = OnceLock::new();
    STILL_RE.get_or_init(|| Regex::new(r"(?i) still(?:\s+logged\s+in)?").expect("valid still-marker regex"))
}

fn epoch_re() -> &'static Regex {
    static EPOCH_RE: OnceLock<Regex> = OnceLock::new();
    EPOCH_RE.get_or_init(|| Regex::new(r"^\d{10,}$").expect("valid epoch regex"))
}

fn partial_re() -> &'static Regex {
    static PARTIAL_RE: OnceLock<Regex> = OnceLock::new();
    PARTIAL_RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z]{3})\s+(\d{1,2})\s+(\d{1,2}):(\d{2})$").expect("valid partial date regex")
    })
}

fn dotnet_re() -> &'static Regex {
    static DOTNET_RE: OnceLock<Regex> = OnceLock::new();
    DOTNET_RE.get_or_init(|| {
        Regex::new(r"^/Date\((-?\d+)(?:[+-]\d{4})?\)/$").expect("valid dotnet date regex")
    })
}

pub fn format_date(input: Option<&Value>, show_active: bool) -> ParsedTimestamp {
    format_date_at(input, show_active, Utc::now())
}

// `now` supplies the year for partial `Mon D HH:MM` stamps
pub fn format_date_at(input: Option<&Value>, show_active: bool, now: DateTime<Utc>) -> ParsedTimestamp {
    let raw = match input {
        None | Some(Value::Null) => return ParsedTimestamp::unknown(),
        Some(Value::String(s)) if s.trim().is_empty() => return ParsedTimestamp::unknown(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => {
            return match n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)) {
                Some(epoch) => finish(from_epoch(epoch), n.to_string(), false, show_active),
                None => finish(None, n.to_string(), false, show_active),
            };
        }
        Some(other) => other.to_string(),
    };

    let is_active = still_re().is_match(&raw);
    let stripped = if is_active {
        still_re().replace_all(&raw, "").trim().to_string()
    } else {
        raw.trim().to_string()
    };

    let instant = match try_parse_instant(&stripped, now) {
        Ok(instant) => Some(instant),
        Err(e) => {
            debug!("{}", e);
            None
        }
    };
    finish(instant, raw, is_active, show_active)
}

fn finish(instant: Option<DateTime<Utc>>, raw: String, is_active: bool, show_active: bool) -> ParsedTimestamp {
    let mut text = match instant {
        Some(at) => at.format(DISPLAY_FORMAT).to_string(),
        None => raw,
    };
    if show_active && is_active {
        text.push_str(ACTIVE_SUFFIX);
    }
    ParsedTimestamp {
        text,
        instant,
        is_active,
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value > EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

pub fn try_parse_instant(text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, NormalizeError> {
    let unparseable = || NormalizeError::UnparseableTimestamp(text.to_string());

    if epoch_re().is_match(text) {
        let value: i64 = text.parse().map_err(|_| unparseable())?;
        return from_epoch(value).ok_or_else(unparseable);
    }

    if let Some(caps) = partial_re().captures(text) {
        let stamp = format!("{} {} {} {}:{}", &caps[1], &caps[2], now.year(), &caps[3], &caps[4]);
        return NaiveDateTime::parse_from_str(&stamp, "%b %d %Y %H:%M")
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|_| unparseable());
    }

    parse_generic(text).ok_or_else(unparseable)
}

fn parse_generic(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_rfc2822(text) {
        return Some(at.with_timezone(&Utc));
    }
    if let Some(caps) = dotnet_re().captures(text) {
        return caps[1].parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
    }
    for layout in ZONED_LAYOUTS {
        if let Ok(at) = DateTime::parse_from_str(text, layout) {
            return Some(at.with_timezone(&Utc));
        }
    }
    for layout in DATETIME_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(text, layout) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn fmt(input: Value) -> ParsedTimestamp {
        format_date_at(Some(&input), false, reference_now())
    }

    #[test]
    fn empty_input_is_unknown() {
        for parsed in [
            format_date(None, false),
            format_date(Some(&json!(null)), true),
            format_date(Some(&json!("")), false),
            format_date(Some(&json!("   ")), false),
        ] {
            assert_eq!(parsed, ParsedTimestamp::unknown());
        }
    }

    #[test]
    fn epoch_seconds_string() {
        let parsed = fmt(json!("1700000000"));
        assert_eq!(parsed.instant, Utc.timestamp_opt(1_700_000_000, 0).single());
        assert_eq!(parsed.text, "Nov 14, 2023, 22:13");
        assert!(!parsed.is_active);
    }

    #[test]
    fn epoch_millis_string() {
        let parsed = fmt(json!("1700000000000"));
        assert_eq!(parsed.instant, Utc.timestamp_opt(1_700_000_000, 0).single());
    }

    #[test]
    fn threshold_boundary() {
        let at = fmt(json!("9999999999")).instant.unwrap();
        assert_eq!(at.timestamp(), 9_999_999_999);
        let above = fmt(json!("10000000000")).instant.unwrap();
        assert_eq!(above.timestamp_millis(), 10_000_000_000);
    }

    #[test]
    fn epoch_numbers() {
        assert_eq!(fmt(json!(1700000000)).instant.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(fmt(json!(1700000000123i64)).instant.unwrap().timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn partial_date_assumes_current_year() {
        let parsed = fmt(json!("Jan 22 09:08"));
        assert_eq!(parsed.instant, Utc.with_ymd_and_hms(2025, 1, 22, 9, 8, 0).single());
        assert_eq!(parsed.text, "Jan 22, 2025, 09:08");

        let live = format_date(Some(&json!("Jan 22 09:08")), false);
        assert_eq!(live.instant.unwrap().year(), Utc::now().year());
    }

    #[test]
    fn still_marker_sets_active() {
        let parsed = fmt(json!("2024-01-01 still"));
        assert!(parsed.is_active);
        assert!(parsed.instant.is_some());
        assert!(!parsed.text.to_lowercase().contains("still"));
        assert_eq!(parsed.text, "Jan 1, 2024, 00:00");

        let parsed = fmt(json!("Jan 22 09:08 STILL logged in"));
        assert!(parsed.is_active);
        assert_eq!(parsed.text, "Jan 22, 2025, 09:08");
        assert_eq!(parsed.instant, Utc.with_ymd_and_hms(2025, 1, 22, 9, 8, 0).single());
    }

    #[test]
    fn show_active_appends_suffix() {
        let parsed = format_date_at(Some(&json!("Mar 3 10:00 still")), true, reference_now());
        assert_eq!(parsed.text, "Mar 3, 2025, 10:00 (active)");
        let parsed = format_date_at(Some(&json!("Mar 3 10:00")), true, reference_now());
        assert_eq!(parsed.text, "Mar 3, 2025, 10:00");
    }

    #[test]
    fn unparseable_input_is_kept() {
        let parsed = fmt(json!("not a date"));
        assert_eq!(parsed.instant, None);
        assert_eq!(parsed.text, "not a date");

        let parsed = fmt(json!("garbage still"));
        assert_eq!(parsed.text, "garbage still");
        assert!(parsed.is_active);
        assert_eq!(parsed.instant, None);
    }

    #[test]
    fn generic_layouts() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).single();
        for input in [
            "2024-03-05T14:30:00Z",
            "2024-03-05T16:30:00+02:00",
            "2024-03-05 14:30:00",
            "2024-03-05T14:30:00.000",
            "2024-03-05 14:30:00 +0000",
            "2024/03/05 14:30:00",
            "3/5/2024 2:30:00 PM",
            "Tue Mar  5 14:30:00 2024",
            "Tue, 5 Mar 2024 14:30:00 +0000",
            "/Date(1709649000000)/",
        ] {
            assert_eq!(fmt(json!(input)).instant, expected, "input: {input}");
        }
    }

    #[test]
    fn date_only_is_midnight() {
        let parsed = fmt(json!("2024-03-05"));
        assert_eq!(parsed.instant, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).single());
    }

    #[test]
    fn strict_parser_reports_failure() {
        assert!(matches!(
            try_parse_instant("Foo 99 99:99", reference_now()),
            Err(NormalizeError::UnparseableTimestamp(_))
        ));
    }
}
