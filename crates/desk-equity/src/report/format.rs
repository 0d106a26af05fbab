//! Titled text blocks

use serde_json::Value;
use std::collections::BTreeMap;

use super::Table;

/// Body used whenever a category has nothing to show
pub const NOT_AVAILABLE: &str = "Data not available.";

/// Shapes of data a report block can carry
#[derive(Debug, Clone, PartialEq)]
pub enum ReportValue {
    Table(Table),
    /// Key/value fields, rendered with sorted keys
    Mapping(BTreeMap<String, Value>),
    Sequence(Vec<Value>),
    Text(String),
}

impl ReportValue {
    fn is_empty(&self) -> bool {
        match self {
            Self::Table(table) => table.is_empty(),
            Self::Mapping(map) => map.is_empty(),
            Self::Sequence(items) => items.is_empty(),
            Self::Text(_) => false,
        }
    }
}

impl From<Table> for ReportValue {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

/// Render `value` under a `--- title ---` header.
///
/// Missing or empty data renders as [`NOT_AVAILABLE`].
pub fn format_block(value: Option<&ReportValue>, title: &str) -> String {
    let body = match value {
        None => NOT_AVAILABLE.to_string(),
        Some(v) if v.is_empty() => NOT_AVAILABLE.to_string(),
        Some(ReportValue::Table(table)) => table.to_string(),
        Some(ReportValue::Mapping(map)) => {
            serde_json::to_string_pretty(map).unwrap_or_else(|_| format!("{map:?}"))
        }
        Some(ReportValue::Sequence(items)) => {
            serde_json::to_string_pretty(items).unwrap_or_else(|_| format!("{items:?}"))
        }
        Some(ReportValue::Text(text)) => text.clone(),
    };
    format!("--- {title} ---\n{body}")
}

/// Shorthand for a block with no data
pub fn unavailable(title: &str) -> String {
    format_block(None, title)
}

/// Group the integer digits of a number with commas: `3000000` -> `3,000,000`.
///
/// Non-numeric values render as `0`.
pub fn group_thousands(value: &Value) -> String {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        _ => return "0".to_string(),
    };

    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };
    let (int_part, rest) = match unsigned.find(['.', 'e', 'E']) {
        Some(pos) => unsigned.split_at(pos),
        None => (unsigned, ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}{grouped}{rest}")
}
