//! agtype result parsing
//!
//! The graph engine returns scalar and array columns as loosely-typed strings
//! with an embedded `::typename` suffix (e.g. `3::numeric`,
//! `"Algebra"::text`, `["a", "b"]::path`). Values are parsed into [`AgValue`]
//! at this boundary; raw strings never propagate past it.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Matches a `::typename` annotation appended by the graph engine
fn type_suffix() -> &'static Regex {
    static TYPE_SUFFIX: OnceLock<Regex> = OnceLock::new();
    TYPE_SUFFIX.get_or_init(|| Regex::new(r"::\w+").unwrap())
}

/// A parsed agtype value
#[derive(Debug, Clone, PartialEq)]
pub enum AgValue {
    /// Numeric scalar
    Number(f64),
    /// Textual scalar
    Text(String),
    /// Array column
    List(Vec<AgValue>),
}

impl AgValue {
    /// Numeric view of this value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AgValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Textual view of this value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// List view of this value
    pub fn as_list(&self) -> Option<&[AgValue]> {
        match self {
            AgValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Strip a single trailing `::typename` annotation from a scalar
fn strip_scalar_suffix(raw: &str) -> &str {
    if let Some(pos) = raw.rfind("::") {
        let suffix = &raw[pos + 2..];
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return &raw[..pos];
        }
    }
    raw
}

/// Parse a scalar column value
///
/// Strips the trailing type annotation, attempts numeric coercion, and falls
/// back to the raw string (surrounding quotes removed) when not numeric.
pub fn parse_scalar(raw: &str) -> AgValue {
    let stripped = strip_scalar_suffix(raw.trim()).trim();

    if let Ok(n) = stripped.parse::<f64>() {
        return AgValue::Number(n);
    }

    let unquoted = stripped
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(stripped);
    AgValue::Text(unquoted.to_string())
}

/// Parse an array column value
///
/// Array columns arrive as JSON text whose elements carry the same per-element
/// type suffixes; all suffixes are removed before decoding. A decode failure
/// yields an empty array and a warning, never an error.
pub fn parse_array(raw: &str) -> Vec<AgValue> {
    let cleaned = type_suffix().replace_all(raw.trim(), "");

    match serde_json::from_str::<serde_json::Value>(&cleaned) {
        Ok(serde_json::Value::Array(items)) => items.into_iter().map(from_json).collect(),
        Ok(other) => {
            warn!("Expected array column, got {}", other);
            Vec::new()
        }
        Err(e) => {
            warn!("Failed to parse array column {:?}: {}", raw, e);
            Vec::new()
        }
    }
}

/// Parse a column that may be either a scalar or an array
pub fn parse_column(raw: &str) -> AgValue {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        AgValue::List(parse_array(trimmed))
    } else {
        parse_scalar(trimmed)
    }
}

fn from_json(value: serde_json::Value) -> AgValue {
    match value {
        serde_json::Value::Number(n) => AgValue::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => AgValue::Text(s),
        serde_json::Value::Array(items) => AgValue::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Bool(b) => AgValue::Text(b.to_string()),
        serde_json::Value::Null => AgValue::Text(String::new()),
        other => AgValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_with_suffix() {
        assert_eq!(parse_scalar("3::numeric"), AgValue::Number(3.0));
        assert_eq!(parse_scalar("2.5::float8"), AgValue::Number(2.5));
        assert_eq!(parse_scalar("42"), AgValue::Number(42.0));
    }

    #[test]
    fn test_string_with_suffix() {
        assert_eq!(
            parse_scalar("\"Algebra\"::text"),
            AgValue::Text("Algebra".to_string())
        );
        assert_eq!(parse_scalar("Calculus"), AgValue::Text("Calculus".to_string()));
    }

    #[test]
    fn test_non_suffix_double_colon_is_kept() {
        // "::" not followed by an identifier is part of the value
        assert_eq!(parse_scalar("a::"), AgValue::Text("a::".to_string()));
    }

    #[test]
    fn test_array_with_element_suffixes() {
        let parsed = parse_array(r#"["Algebra"::text, "Calculus"::text]"#);
        assert_eq!(
            parsed,
            vec![
                AgValue::Text("Algebra".to_string()),
                AgValue::Text("Calculus".to_string()),
            ]
        );
    }

    #[test]
    fn test_array_of_numbers() {
        let parsed = parse_array("[1::numeric, 2::numeric, 3::numeric]");
        assert_eq!(
            parsed,
            vec![AgValue::Number(1.0), AgValue::Number(2.0), AgValue::Number(3.0)]
        );
    }

    #[test]
    fn test_malformed_array_yields_empty() {
        assert!(parse_array("[not json").is_empty());
        assert!(parse_array("{\"a\": 1}").is_empty());
    }

    #[test]
    fn test_parse_column_dispatch() {
        assert_eq!(parse_column("7::numeric"), AgValue::Number(7.0));
        assert_eq!(
            parse_column(r#"["x"::text]"#),
            AgValue::List(vec![AgValue::Text("x".to_string())])
        );
    }
}
