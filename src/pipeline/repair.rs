//! Recover a JSON object from imperfect model output.
//!
//! Handles the failure shapes seen in practice: markdown fences, prose
//! around the object, trailing commas, and answers cut off by `max_tokens`.
//! Anything still unparseable after these passes is left to the validator
//! to report.

use serde_json::Value;
use tracing::debug;

/// Strip a surrounding ```json … ``` fence, if any.
pub fn strip_fences(raw: &str) -> &str {
    let t = raw.trim();
    if let Some(rest) = t.strip_prefix("```") {
        let body = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest,
        };
        let body = body.trim_end();
        return body.strip_suffix("```").unwrap_or(body).trim();
    }
    t
}

/// Return the first balanced `{ … }` span, or everything from the first
/// `{` when the object is never closed.
pub fn isolate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    Some(&text[start..])
}

/// Drop commas that directly precede `}` or `]` (outside strings).
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']') | None) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// A container still open where the text ends.
struct Open {
    closer: char,
    /// Byte offset of the opening bracket.
    at: usize,
    /// Opened directly inside an array.
    element: bool,
}

/// Close a JSON document that was cut off mid-way.
///
/// A string cut mid-way is dropped together with its key, since a partial
/// value is a wrong value. An array element left empty by that is dropped
/// too. Dangling keys and trailing commas go, and the missing closers are
/// appended in reverse nesting order.
pub fn close_truncated(text: &str) -> String {
    let mut stack: Vec<Open> = Vec::new();
    let mut string_start: Option<usize> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if string_start.is_some() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                string_start = None;
            }
            continue;
        }
        match c {
            '"' => string_start = Some(i),
            '{' | '[' => {
                let element = stack.last().is_some_and(|o| o.closer == ']');
                let closer = if c == '{' { '}' } else { ']' };
                stack.push(Open { closer, at: i, element });
            }
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = text.to_string();
    if let Some(start) = string_start {
        out.truncate(start);
    }
    drop_dangling(&mut out);

    if let Some(open) = stack.last() {
        if open.closer == '}' && open.element && out.trim_end().ends_with('{') {
            out.truncate(open.at);
            stack.pop();
            drop_dangling(&mut out);
        }
    }

    if stack.last().is_some_and(|o| o.closer == '}') {
        // An object ending in a bare string is a key without a value.
        if let Some(pos) = dangling_key_start(&out) {
            out.truncate(pos);
            let t = out.trim_end().trim_end_matches(',').len();
            out.truncate(t);
        }
    }

    while let Some(open) = stack.pop() {
        out.push(open.closer);
    }
    out
}

/// Strip trailing whitespace, commas and value-less `"key":` pairs.
fn drop_dangling(out: &mut String) {
    loop {
        let trimmed = out.trim_end();
        let comma = trimmed.ends_with(',');
        let colon = trimmed.ends_with(':');
        if !comma && !colon {
            let t = trimmed.len();
            out.truncate(t);
            break;
        }
        let cut = trimmed.len() - 1;
        out.truncate(cut);
        if colon {
            drop_last_key(out);
        }
    }
}

/// Remove the trailing `"key"` left behind after its colon was dropped.
fn drop_last_key(out: &mut String) {
    let t = out.trim_end();
    if t.ends_with('"') {
        if let Some(open) = t[..t.len() - 1].rfind('"') {
            out.truncate(open);
        }
    }
}

/// Byte offset of a trailing `"key"` that directly follows `{` or `,`.
fn dangling_key_start(out: &str) -> Option<usize> {
    let t = out.trim_end();
    if !t.ends_with('"') || t.len() < 2 {
        return None;
    }
    let open = t[..t.len() - 1].rfind('"')?;
    let before = t[..open].trim_end();
    if before.ends_with('{') || before.ends_with(',') {
        Some(open)
    } else {
        None
    }
}

/// Best-effort recovery of a JSON value from raw model output.
pub fn repair(raw: &str) -> Option<Value> {
    let unfenced = strip_fences(raw);
    let object = isolate_object(unfenced)?;

    if let Ok(v) = serde_json::from_str::<Value>(object) {
        return Some(v);
    }

    let no_commas = remove_trailing_commas(object);
    if let Ok(v) = serde_json::from_str::<Value>(&no_commas) {
        debug!("Recovered model output by removing trailing commas");
        return Some(v);
    }

    let closed = remove_trailing_commas(&close_truncated(&no_commas));
    match serde_json::from_str::<Value>(&closed) {
        Ok(v) => {
            debug!("Recovered truncated model output");
            Some(v)
        }
        Err(e) => {
            debug!("Model output unrecoverable: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("  {}  "), "{}");
    }

    #[test]
    fn isolates_object_from_prose() {
        let raw = "Here is the record:\n{\"a\": \"x}y\", \"b\": [1, 2]}\nHope this helps!";
        assert_eq!(isolate_object(raw), Some("{\"a\": \"x}y\", \"b\": [1, 2]}"));
        assert_eq!(isolate_object("no json"), None);
    }

    #[test]
    fn removes_trailing_commas_outside_strings() {
        assert_eq!(
            remove_trailing_commas("{\"a\": [1, 2,], \"b\": \",}\",}"),
            "{\"a\": [1, 2], \"b\": \",}\"}"
        );
    }

    #[test]
    fn repairs_fenced_output_with_commentary() {
        let raw = "Sure!\n```json\n{\"full_name\": \"John Doe\", \"skills\": [\"Rust\",],}\n```";
        assert_eq!(
            repair(raw),
            Some(json!({"full_name": "John Doe", "skills": ["Rust"]}))
        );
    }

    #[test]
    fn truncated_value_is_dropped_not_kept() {
        let raw = r#"{"full_name": "Jane", "experience": [{"position": "Engin"#;
        assert_eq!(
            repair(raw),
            Some(json!({"full_name": "Jane", "experience": []}))
        );
        assert_eq!(
            repair(r#"{"full_name": "Jane", "email": "jane@exa"#),
            Some(json!({"full_name": "Jane"}))
        );
    }

    #[test]
    fn truncated_element_keeps_completed_fields() {
        let raw = r#"{"full_name": "Jane", "experience": [{"position": "Engineer", "description": "Led the bla"#;
        assert_eq!(
            repair(raw),
            Some(json!({"full_name": "Jane", "experience": [{"position": "Engineer"}]}))
        );
    }

    #[test]
    fn truncated_list_item_is_dropped() {
        let raw = r#"{"full_name": "Jane", "industry": ["Wind", "Offsh"#;
        assert_eq!(
            repair(raw),
            Some(json!({"full_name": "Jane", "industry": ["Wind"]}))
        );
        let raw = r#"{"full_name": "Jane", "experience": [{"position": "Dev"}, {"#;
        assert_eq!(
            repair(raw),
            Some(json!({"full_name": "Jane", "experience": [{"position": "Dev"}]}))
        );
    }

    #[test]
    fn escaped_quote_does_not_end_truncated_string() {
        let raw = r#"{"full_name": "Jane", "summary": "said \"hi"#;
        assert_eq!(repair(raw), Some(json!({"full_name": "Jane"})));
    }

    #[test]
    fn drops_dangling_key() {
        assert_eq!(
            repair(r#"{"full_name": "Jane", "email":"#),
            Some(json!({"full_name": "Jane"}))
        );
        assert_eq!(
            repair(r#"{"full_name": "Jane", "ema"#),
            Some(json!({"full_name": "Jane"}))
        );
    }

    #[test]
    fn unrecoverable_returns_none() {
        assert_eq!(repair("I could not find a resume."), None);
    }
}
