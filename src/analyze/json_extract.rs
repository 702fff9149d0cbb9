//! Defensive parsing of free-form service output.
//!
//! Nothing here assumes the text is valid JSON. Parse results are always a
//! `Result<_, ParseFailure>`; field access on parsed values goes through the
//! optional extractors at the bottom of this module.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("no JSON object containing `{0}` found")]
    NoObject(String),
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("field `{0}` missing or not an array")]
    MissingField(String),
    #[error("structural repair failed: {0}")]
    RepairFailed(String),
}

/// Remove markdown code-fence markers (```json / ```) wherever they occur.
pub fn strip_code_fences(text: &str) -> String {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re = RE_FENCE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("fence regex"));
    re.replace_all(text, "").trim().to_string()
}

/// Index of the `}` closing the object that opens at `start`, skipping string contents.
/// `None` when the object never closes (truncated output).
pub(crate) fn scan_object_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate the first JSON-object-shaped substring that contains `"key"`.
///
/// Candidates are `{` positions before the key, in order. A candidate that closes
/// before the key is skipped; one that encloses the key is returned whole; one
/// that never closes is returned up to the end of the text (for repair).
pub fn locate_object<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{key}\"");
    let key_pos = text.find(&needle)?;
    let mut from = 0usize;
    while let Some(rel) = text[from..key_pos].find('{') {
        let start = from + rel;
        match scan_object_end(text, start) {
            None => return Some(&text[start..]),
            Some(end) if end > key_pos => return Some(&text[start..=end]),
            Some(end) => from = end + 1,
        }
        if from >= key_pos {
            break;
        }
    }
    None
}

/// Fence-strip, locate, and parse the object carrying `key`; return `key`'s array.
pub fn parse_array_field(text: &str, key: &str) -> Result<Vec<Value>, ParseFailure> {
    let cleaned = strip_code_fences(text);
    let obj = locate_object(&cleaned, key).ok_or_else(|| ParseFailure::NoObject(key.to_string()))?;
    let value: Value =
        serde_json::from_str(obj).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;
    array_field(&value, key)
}

pub(crate) fn array_field(value: &Value, key: &str) -> Result<Vec<Value>, ParseFailure> {
    value
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| ParseFailure::MissingField(key.to_string()))
}

// ------------------------------------------------------------
// Optional-field extractors
// ------------------------------------------------------------

/// First non-empty string among `keys`, trimmed.
pub fn str_field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| v.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// First integer-like value among `keys` (numbers, or numeric strings).
pub fn int_field(v: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().filter_map(|k| v.get(*k)).find_map(as_int)
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

/// Non-negative indices from the first array-or-scalar among `keys`.
pub fn index_list(v: &Value, keys: &[&str]) -> Vec<usize> {
    for k in keys {
        match v.get(*k) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(as_int)
                    .filter_map(|i| usize::try_from(i).ok())
                    .collect();
            }
            Some(other) => {
                if let Some(i) = as_int(other).and_then(|i| usize::try_from(i).ok()) {
                    return vec![i];
                }
            }
            None => {}
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_fences_anywhere() {
        let s = "Here you go:\n```json\n{\"a\":1}\n```\n";
        assert_eq!(strip_code_fences(s), "Here you go:\n\n{\"a\":1}");
    }

    #[test]
    fn locates_object_around_key_past_preamble_objects() {
        let s = r#"note {"x":1} then {"results":[{"h":"a}"}]} trailing"#;
        assert_eq!(locate_object(s, "results"), Some(r#"{"results":[{"h":"a}"}]}"#));
    }

    #[test]
    fn unclosed_object_is_returned_to_end() {
        let s = r#"{"articles":[{"a":1},{"a":"#;
        assert_eq!(locate_object(s, "articles"), Some(s));
        assert_eq!(locate_object(s, "missing"), None);
    }

    #[test]
    fn parse_array_field_reports_failures() {
        assert_eq!(
            parse_array_field("no json here", "results"),
            Err(ParseFailure::NoObject("results".into()))
        );
        assert!(matches!(
            parse_array_field(r#"{"results": [1,}"#, "results"),
            Err(ParseFailure::InvalidJson(_))
        ));
        assert_eq!(
            parse_array_field(r#"{"results": "none"}"#, "results"),
            Err(ParseFailure::MissingField("results".into()))
        );
        assert_eq!(
            parse_array_field("```json\n{\"results\": [1, 2]}\n```", "results").unwrap().len(),
            2
        );
    }

    #[test]
    fn extractors_tolerate_shapes() {
        let v = json!({"title": "  ", "headline": "H", "score": "7.6", "idx": [1, -2, "3"], "one": 4});
        assert_eq!(str_field(&v, &["title", "headline"]), Some("H".into()));
        assert_eq!(int_field(&v, &["score"]), Some(8));
        assert_eq!(index_list(&v, &["idx"]), vec![1, 3]);
        assert_eq!(index_list(&v, &["one"]), vec![4]);
        assert!(index_list(&v, &["nope"]).is_empty());
    }
}
