//! The recovery ladder: ordered, increasingly aggressive strategies for
//! coercing model output into a valid JSON value. Each layer runs only when
//! the previous one failed; the final layer is a caller-supplied synthetic
//! fallback, so the ladder never fails as a whole.

use serde_json::Value;
use tracing::{debug, warn};

use super::extract;
use super::{ArrayShape, Recovered};

/// Strip markdown code fences and surrounding noise.
pub fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest.trim_start();
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest.trim_start();
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest.trim_end();
    }
    s
}

/// Collapse all whitespace runs (including newlines embedded in what should
/// have been escaped string content) into single spaces. Targets the common
/// failure where a multi-line value breaks strict parsing.
pub fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Append whatever closing delimiters the text is short of, innermost
/// first. Helps when generation stopped after the last complete element.
pub fn balance_delimiters(s: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => stack.push(c),
            '}' if !in_string => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                }
            }
            ']' if !in_string => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut fixed = s.trim_end().trim_end_matches(',').to_string();
    if in_string {
        fixed.push('"');
    }
    while let Some(open) = stack.pop() {
        fixed.push(if open == '{' { '}' } else { ']' });
    }
    fixed
}

fn slice_array(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    (end > start).then(|| &s[start..=end])
}

fn slice_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

fn element_has_fields(element: &Value, fields: &[&str]) -> bool {
    fields.iter().all(|f| element.get(f).is_some())
}

fn parse_valid_array(text: &str, shape: &ArrayShape) -> Option<Vec<Value>> {
    let items = serde_json::from_str::<Value>(text).ok()?;
    let Value::Array(items) = items else {
        return None;
    };
    items
        .iter()
        .all(|el| el.is_object() && element_has_fields(el, shape.required_fields))
        .then_some(items)
}

/// Recover an array of record-shaped elements from raw model text.
///
/// Layers: fence strip + direct parse → whitespace normalization →
/// truncation repair (delimiter balancing, then complete-element
/// extraction) → synthetic fallback. The fallback closure supplies the
/// caller's minimum valid value, so the returned vector is never unusable.
pub fn recover_array<F>(raw: &str, shape: &ArrayShape, fallback: F) -> Recovered<Vec<Value>>
where
    F: FnOnce() -> Vec<Value>,
{
    let stripped = strip_fences(raw);
    let body = slice_array(stripped).unwrap_or(stripped);

    if let Some(items) = parse_valid_array(body, shape) {
        return Recovered::Parsed(items);
    }

    let collapsed = normalize_whitespace(body);
    if let Some(items) = parse_valid_array(&collapsed, shape) {
        debug!("array recovered via whitespace normalization");
        return Recovered::Parsed(items);
    }

    let balanced = balance_delimiters(&collapsed);
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&balanced) {
        let total = items.len();
        let valid: Vec<Value> = items
            .into_iter()
            .filter(|el| el.is_object() && element_has_fields(el, shape.required_fields))
            .collect();
        if !valid.is_empty() {
            let dropped = total - valid.len();
            debug!(dropped, "array recovered via delimiter balancing");
            return Recovered::Partial(valid, dropped);
        }
    }

    let (objects, mut dropped) = extract::balanced_objects(stripped);
    let valid: Vec<Value> = objects
        .into_iter()
        .filter(|el| {
            let ok = element_has_fields(el, shape.required_fields);
            if !ok {
                dropped += 1;
            }
            ok
        })
        .collect();
    if !valid.is_empty() {
        debug!(recovered = valid.len(), dropped, "array recovered via element extraction");
        return Recovered::Partial(valid, dropped);
    }

    warn!("array recovery exhausted; synthesizing fallback records");
    Recovered::Fallback(fallback())
}

/// Recover a single record-shaped object from raw model text.
///
/// Layers: fence strip + direct parse → whitespace normalization →
/// truncation repair → partial named-field extraction → synthetic fallback.
pub fn recover_object<F>(
    raw: &str,
    required_fields: &[&str],
    partial_fields: &[&str],
    fallback: F,
) -> Recovered<Value>
where
    F: FnOnce() -> Value,
{
    let stripped = strip_fences(raw);
    let body = slice_object(stripped).unwrap_or(stripped);

    let valid = |v: &Value| v.is_object() && element_has_fields(v, required_fields);

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if valid(&value) {
            return Recovered::Parsed(value);
        }
    }

    let collapsed = normalize_whitespace(body);
    if let Ok(value) = serde_json::from_str::<Value>(&collapsed) {
        if valid(&value) {
            debug!("object recovered via whitespace normalization");
            return Recovered::Parsed(value);
        }
    }

    let balanced = balance_delimiters(&collapsed);
    if let Ok(value) = serde_json::from_str::<Value>(&balanced) {
        if valid(&value) {
            debug!("object recovered via delimiter balancing");
            return Recovered::Partial(value, 0);
        }
    }

    if let Some(value) = extract::partial_object(stripped, partial_fields) {
        let missing = partial_fields
            .iter()
            .filter(|f| value.get(**f).is_none())
            .count();
        debug!(missing, "object recovered via partial field extraction");
        return Recovered::Partial(value, missing);
    }

    warn!("object recovery exhausted; synthesizing fallback value");
    Recovered::Fallback(fallback())
}
