//! Best-effort recovery of JSON embedded in free-text model completions.
//!
//! Completions routinely wrap the payload in prose or markdown fences, so the
//! scanners below walk every opening bracket in order and return the first
//! balanced span that parses. Nothing here returns an error: an unusable
//! completion is simply `None`.

use serde_json::{Map, Value};

/// First JSON array embedded in `text`.
pub fn first_json_array(text: &str) -> Option<Vec<Value>> {
    match first_balanced_json(text, b'[', b']')? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// First JSON object embedded in `text`.
pub fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    match first_balanced_json(text, b'{', b'}')? {
        Value::Object(fields) => Some(fields),
        _ => None,
    }
}

fn first_balanced_json(text: &str, open: u8, close: u8) -> Option<Value> {
    text.bytes()
        .enumerate()
        .filter(|(_, b)| *b == open)
        .find_map(|(start, _)| {
            let end = balanced_end(text.as_bytes(), start, open, close)?;
            serde_json::from_str::<Value>(&text[start..end]).ok()
        })
}

/// Index one past the bracket closing the one at `start`, ignoring brackets
/// inside string literals.
fn balanced_end(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
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

        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(start + offset + 1);
            }
        }
    }

    None
}
