//! Structural repair of truncated service output.
//!
//! The enrichment response is a single object whose `articles` array is long
//! enough that providers sometimes cut it off mid-element. The scanner below is
//! an explicit state machine over bracket and brace depth (string contents are
//! skipped) that remembers the last byte at which an element of the array was
//! fully closed: array depth 1 and brace depth just returned to 0. Everything
//! after that point is dropped, the array and object are closed, and an empty
//! `coverageGaps` list is appended.

use serde_json::Value;

use crate::analyze::json_extract::{array_field, ParseFailure};

#[derive(Debug, Default)]
struct ScanState {
    in_string: bool,
    escaped: bool,
    /// Depth relative to the target array; 1 while inside it.
    bracket_depth: usize,
    /// Brace depth relative to the target array.
    brace_depth: usize,
    /// Exclusive end of the last fully-formed element.
    last_complete: Option<usize>,
    /// Index of the `]` that closed the array, when it did close.
    closed_at: Option<usize>,
}

/// Position of the `[` that opens the value of `"key"`, if the key is followed by `:` and `[`.
fn array_open(text: &str, key: &str) -> Option<usize> {
    let needle = format!("\"{key}\"");
    let key_pos = text.find(&needle)?;
    let after = key_pos + needle.len();
    let rest = &text[after..];
    let colon = rest.find(|c: char| !c.is_whitespace())?;
    if !rest[colon..].starts_with(':') {
        return None;
    }
    let value_rel = rest[colon + 1..].find(|c: char| !c.is_whitespace())?;
    let open = after + colon + 1 + value_rel;
    (text.as_bytes().get(open) == Some(&b'[')).then_some(open)
}

fn scan(text: &str, open: usize) -> ScanState {
    let mut st = ScanState {
        bracket_depth: 1,
        ..Default::default()
    };
    for (i, &b) in text.as_bytes().iter().enumerate().skip(open + 1) {
        if st.in_string {
            if st.escaped {
                st.escaped = false;
            } else if b == b'\\' {
                st.escaped = true;
            } else if b == b'"' {
                st.in_string = false;
            }
            continue;
        }
        match b {
            b'"' => st.in_string = true,
            b'{' => st.brace_depth += 1,
            b'}' => {
                st.brace_depth = st.brace_depth.saturating_sub(1);
                if st.brace_depth == 0 && st.bracket_depth == 1 {
                    st.last_complete = Some(i + 1);
                }
            }
            b'[' => st.bracket_depth += 1,
            b']' => {
                st.bracket_depth = st.bracket_depth.saturating_sub(1);
                if st.bracket_depth == 0 {
                    st.closed_at = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    st
}

/// Truncate `text` after the last complete element of the `key` array and close it.
/// `text` should start at (or before) the enclosing object's `{`.
pub fn repair_truncated_array(text: &str, key: &str) -> Result<String, ParseFailure> {
    let start = text
        .find('{')
        .ok_or_else(|| ParseFailure::RepairFailed("no object start".into()))?;
    let text = &text[start..];
    let open = array_open(text, key)
        .ok_or_else(|| ParseFailure::RepairFailed(format!("no `{key}` array")))?;

    let st = scan(text, open);
    let cut = match (st.closed_at, st.last_complete) {
        // The array itself closed; the damage is after it.
        (Some(closed), _) => closed,
        (None, Some(end)) => end,
        (None, None) => {
            return Err(ParseFailure::RepairFailed(
                "no fully-formed array element".into(),
            ))
        }
    };

    let mut out = String::with_capacity(cut + 32);
    out.push_str(&text[..cut]);
    out.push_str("], \"coverageGaps\": []}");
    Ok(out)
}

/// Repair, reparse once, and return the recovered elements (never empty on success).
pub fn recover_array(text: &str, key: &str) -> Result<Vec<Value>, ParseFailure> {
    let repaired = repair_truncated_array(text, key)?;
    let value: Value = serde_json::from_str(&repaired)
        .map_err(|e| ParseFailure::RepairFailed(format!("reparse: {e}")))?;
    let items = array_field(&value, key)?;
    if items.is_empty() {
        return Err(ParseFailure::RepairFailed("no elements recovered".into()));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_mid_object_keeps_only_complete_elements() {
        let text = r#"{"articles": [{"headline": "A", "sourceIndices": [0]}, {"headline": "B {[", "x": {"y": 1}}, {"headline": "C", "sum"#;
        let items = recover_array(text, "articles").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["headline"], "A");
        assert_eq!(items[1]["headline"], "B {[");
        assert_eq!(items[1]["x"]["y"], 1);
    }

    #[test]
    fn truncated_inside_string_after_complete_element() {
        let text = r#"{"articles":[{"headline":"A"},{"headline":"unterminated \" quote"#;
        let items = recover_array(text, "articles").unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn damage_after_closed_array_is_dropped() {
        let text = r#"{"articles":[{"headline":"A"}], "coverageGaps": [{"entity": "#;
        let items = recover_array(text, "articles").unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn nothing_complete_is_a_failure() {
        assert!(matches!(
            recover_array(r#"{"articles":[{"headline":"A""#, "articles"),
            Err(ParseFailure::RepairFailed(_))
        ));
        assert!(matches!(
            recover_array(r#"{"articles": "oops""#, "articles"),
            Err(ParseFailure::RepairFailed(_))
        ));
        assert!(recover_array("plain prose", "articles").is_err());
    }

    #[test]
    fn repaired_text_has_closing_suffix() {
        let out = repair_truncated_array(r#"prefix {"articles":[{"a":1},{"a""#, "articles").unwrap();
        assert_eq!(out, r#"{"articles":[{"a":1}], "coverageGaps": []}"#);
    }
}
