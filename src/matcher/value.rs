//! Typed field values for range comparisons.

use crate::config::ColumnType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// A field value parsed according to its column's declared type.
///
/// Values produced for one column always share a variant, so the derived ordering
/// compares them by their payload.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum TypedValue {
    SignedInt(i64),
    UnsignedInt(u64),
    Float(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl TypedValue {
    /// Parse `text` as `value_type`. Returns `None` when the text is not a valid value
    /// of that type.
    pub fn parse(value_type: ColumnType, format_hint: &str, text: &str) -> Option<Self> {
        let trimmed = text.trim();
        match value_type {
            ColumnType::SignedInt => trimmed.parse().ok().map(Self::SignedInt),
            ColumnType::UnsignedInt => trimmed.parse().ok().map(Self::UnsignedInt),
            ColumnType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| !v.is_nan())
                .map(Self::Float),
            ColumnType::Boolean => parse_bool(trimmed).map(Self::Boolean),
            ColumnType::Timestamp => parse_timestamp(trimmed, format_hint).map(Self::Timestamp),
            ColumnType::Str => Some(Self::Text(text.to_string())),
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Parse a timestamp with the column's format hint, or with common layouts when the
/// column has none. Time-only formats are anchored at the epoch date.
fn parse_timestamp(text: &str, format_hint: &str) -> Option<NaiveDateTime> {
    if !format_hint.is_empty() {
        return parse_with_format(text, format_hint);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_with_format(text, "%Y-%m-%d"))
}

fn parse_with_format(text: &str, format: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, format) {
        return date.and_hms_opt(0, 0, 0);
    }
    let time = NaiveTime::parse_from_str(text, format).ok()?;
    NaiveDate::from_ymd_opt(1970, 1, 1).map(|epoch| epoch.and_time(time))
}
