//! Defensive JSON extraction from model output
//!
//! Models asked for JSON often wrap it in markdown fences or surround it with
//! prose. Extraction tries, in order:
//!
//! 1. The whole text
//! 2. The text with a leading/trailing code fence removed
//! 3. The first balanced `{ ... }` span, tracking strings and escapes

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// A parsed JSON object
pub type JsonObject = Map<String, Value>;

static FENCE_OPEN: OnceLock<Regex> = OnceLock::new();
static FENCE_CLOSE: OnceLock<Regex> = OnceLock::new();

fn fence_open() -> &'static Regex {
    FENCE_OPEN.get_or_init(|| Regex::new(r"^```(?:json)?\s*").unwrap())
}

fn fence_close() -> &'static Regex {
    FENCE_CLOSE.get_or_init(|| Regex::new(r"\s*```$").unwrap())
}

fn parse_object(text: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Remove a surrounding markdown code fence, if present
pub fn strip_code_fence(text: &str) -> String {
    let opened = fence_open().replace(text, "");
    fence_close().replace(&opened, "").into_owned()
}

/// Parse the first balanced JSON object in `text`
///
/// Returns `None` if no object closes or the balanced span is not valid JSON.
pub fn extract_json_object(text: &str) -> Option<JsonObject> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, c) in text[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' => escape = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return parse_object(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Three-tier extraction of a JSON object from model output
pub fn parse_structured(text: &str) -> Option<JsonObject> {
    if let Some(map) = parse_object(text) {
        return Some(map);
    }

    let mut candidate = text.trim().to_string();
    if candidate.starts_with("```") {
        candidate = strip_code_fence(&candidate);
        if let Some(map) = parse_object(&candidate) {
            return Some(map);
        }
    }

    extract_json_object(&candidate)
}

/// Numeric field, accepting numbers or numeric strings
pub fn number_field(map: &JsonObject, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// String field; non-string scalars are rendered as JSON
pub fn string_field(map: &JsonObject, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// List-of-strings field; a bare string becomes a one-element list
pub fn string_list_field(map: &JsonObject, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}
