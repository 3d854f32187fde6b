//! Low-level salvage: pulling balanced objects and individual named fields
//! out of text that is not valid JSON as a whole.
//!
//! The object scanner is an explicit cursor over characters (tracking string
//! and escape state) rather than a bracket regex, so nested objects and
//! braces inside string values are handled correctly.

use regex::Regex;
use serde_json::Value;

/// Scan `text` for balanced `{…}` spans and parse each as JSON. Returns the
/// parsed objects in encounter order plus the number of candidates that were
/// dropped: spans that failed to parse, and an unterminated trailing object
/// if the text ends mid-element.
pub fn balanced_objects(text: &str) -> (Vec<Value>, usize) {
    let mut objects = Vec::new();
    let mut dropped = 0;

    let bytes: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != '{' {
            i += 1;
            continue;
        }
        match scan_balanced(&bytes, i) {
            Some(end) => {
                let candidate: String = bytes[i..=end].iter().collect();
                match serde_json::from_str::<Value>(&candidate) {
                    Ok(value @ Value::Object(_)) => objects.push(value),
                    _ => dropped += 1,
                }
                i = end + 1;
            }
            None => {
                // Truncated tail element: nothing balanced from here on.
                dropped += 1;
                break;
            }
        }
    }

    (objects, dropped)
}

/// Find the index of the `}` closing the `{` at `start`, honoring string
/// literals and escapes. `None` when the input ends first.
fn scan_balanced(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &c) in chars[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract the value of a named string field (`"name": "…"`) directly from
/// raw text, decoding JSON escapes. Used when no structural repair works.
pub fn string_field(text: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r#""{}"\s*:\s*("(?:[^"\\]|\\.)*")"#,
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    serde_json::from_str::<String>(&caps[1]).ok()
}

/// Assemble a minimal object from whichever of `fields` can be found in the
/// raw text. `None` when not a single field matched.
pub fn partial_object(text: &str, fields: &[&str]) -> Option<Value> {
    let mut map = serde_json::Map::new();
    for field in fields {
        if let Some(value) = string_field(text, field) {
            map.insert(field.to_string(), Value::String(value));
        }
    }
    (!map.is_empty()).then(|| Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_scan_handles_nested_and_string_braces() {
        let text = r#"noise [{"a": {"b": 1}, "c": "}{"}, {"a": 2"#;
        let (objects, dropped) = balanced_objects(text);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["a"]["b"], 1);
        assert_eq!(objects[0]["c"], "}{");
        assert_eq!(dropped, 1);
    }

    #[test]
    fn string_field_decodes_escapes() {
        let text = r#"..."title": "Line 1\nLine 2", ..."#;
        assert_eq!(string_field(text, "title").as_deref(), Some("Line 1\nLine 2"));
    }

    #[test]
    fn partial_object_requires_at_least_one_field() {
        assert!(partial_object("nothing here", &["title", "content"]).is_none());
        let obj = partial_object(r#""title": "T""#, &["title", "content"]).unwrap();
        assert_eq!(obj["title"], "T");
        assert!(obj.get("content").is_none());
    }
}
