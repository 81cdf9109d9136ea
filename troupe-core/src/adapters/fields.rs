//! Defensive field readers for backend rows.
//!
//! Every reader substitutes a safe default for null, missing or mistyped
//! values, so partially migrated rows still map to a usable model.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::backend::Row;

pub fn text(row: &Row, field: &str) -> String {
    opt_text(row, field).unwrap_or_default()
}

/// Non-empty string value, if any.
pub fn opt_text(row: &Row, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer value; numeric strings are accepted.
pub fn integer(row: &Row, field: &str, default: i64) -> i64 {
    match row.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

pub fn number(row: &Row, field: &str, default: f64) -> f64 {
    match row.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

pub fn flag(row: &Row, field: &str, default: bool) -> bool {
    match row.get(field) {
        Some(Value::Bool(b)) => *b,
        _ => default,
    }
}

/// String array. Non-array values become empty; non-string items are dropped.
pub fn text_list(row: &Row, field: &str) -> Vec<String> {
    match row.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Array of objects. Non-array values become empty; non-object items are dropped.
pub fn object_list<'a>(row: &'a Row, field: &str) -> Vec<&'a Row> {
    match row.get(field) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

pub fn timestamp(row: &Row, field: &str) -> Option<DateTime<Utc>> {
    let raw = row.get(field)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `YYYY-MM-DD` date; a full timestamp is cut to its date part.
pub fn date(row: &Row, field: &str) -> Option<NaiveDate> {
    let raw = row.get(field)?.as_str()?;
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Wraps a JSON object literal as a row; anything else yields an empty row.
pub fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
