//! Content-aware body comparison.
//!
//! JSON payloads are compared as trees: key order and whitespace do not
//! matter, numbers compare by value, and an expected string `"<ignore-diff>"`
//! accepts any value. Expected payloads may carry comments and trailing
//! commas; actual payloads must be plain JSON. Anything that does not parse
//! is compared byte for byte.

use bytes::Bytes;
use serde_json::Value;
use std::fmt::{self, Display};

use crate::domain::{BodyMode, BodySpec};

/// Expected-side wildcard accepting any actual value.
pub const IGNORE_DIFF: &str = "<ignore-diff>";

const MAX_DIAGNOSTIC_BYTES: usize = 4 * 1024;

/// Expected and actual payloads of a failed comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyMismatch {
    pub expected: String,
    pub actual: String,
    /// JSON path of the first differing value, when compared as trees.
    pub path: Option<String>,
}

impl Display for BodyMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "body mismatch at {path}, expected: {}, received: {}",
                self.expected, self.actual
            ),
            None => write!(
                f,
                "body mismatch, expected: {}, received: {}",
                self.expected, self.actual
            ),
        }
    }
}

pub fn matches(expected: &BodySpec, actual: &[u8], content_type: Option<&str>) -> bool {
    compare(expected, actual, content_type).is_ok()
}

pub fn compare(
    expected: &BodySpec,
    actual: &[u8],
    content_type: Option<&str>,
) -> Result<(), BodyMismatch> {
    let as_json = match expected.mode {
        BodyMode::Text => false,
        BodyMode::Json | BodyMode::Auto => true,
    };
    let declared_json = expected.mode == BodyMode::Json
        || content_type.is_some_and(|value| value.to_ascii_lowercase().contains("json"));

    if as_json {
        if let (Some(expected_tree), Some(actual_tree)) =
            (parse_lenient(&expected.bytes), parse_strict(actual))
        {
            let mut path = String::from("$");
            return match first_difference(&expected_tree, &actual_tree, &mut path) {
                None => Ok(()),
                Some(path) => Err(BodyMismatch {
                    expected: clip(&expected.bytes),
                    actual: clip(actual),
                    path: Some(path),
                }),
            };
        }
        if declared_json {
            tracing::debug!("declared JSON body did not parse, comparing bytes");
        }
    }

    if expected.bytes.as_ref() == actual {
        Ok(())
    } else {
        Err(BodyMismatch {
            expected: clip(&expected.bytes),
            actual: clip(actual),
            path: None,
        })
    }
}

/// Parses JSON, tolerating comments and trailing commas.
pub fn parse_lenient(input: &[u8]) -> Option<Value> {
    if let Ok(value) = serde_json::from_slice(input) {
        return Some(value);
    }
    let text = std::str::from_utf8(input).ok()?;
    serde_json::from_str(&strip_decorations(text)).ok()
}

/// Parses a received payload; decorations are not accepted here.
pub fn parse_strict(input: &[u8]) -> Option<Value> {
    serde_json::from_slice(input).ok()
}

/// Rewrites comment-annotated JSON as plain JSON; other payloads are kept.
pub fn normalize_body(input: Bytes) -> Bytes {
    if serde_json::from_slice::<Value>(&input).is_ok() {
        return input;
    }
    match parse_lenient(&input).and_then(|value| serde_json::to_vec(&value).ok()) {
        Some(json) => Bytes::from(json),
        None => input,
    }
}

/// Removes `//` and `/* */` comments and trailing commas outside strings.
fn strip_decorations(input: &str) -> String {
    let mut without_comments = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            without_comments.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        without_comments.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                without_comments.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        without_comments.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
                without_comments.push(' ');
            }
            _ => without_comments.push(c),
        }
    }

    let chars: Vec<char> = without_comments.chars().collect();
    let mut output = String::with_capacity(chars.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &c) in chars.iter().enumerate() {
        if in_string {
            output.push(c);
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
            let next = chars[idx + 1..].iter().find(|next| !next.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        output.push(c);
    }

    output
}

/// Tree equality with the `<ignore-diff>` wildcard on the expected side.
pub fn json_matches(expected: &Value, actual: &Value) -> bool {
    first_difference(expected, actual, &mut String::from("$")).is_none()
}

fn first_difference(expected: &Value, actual: &Value, path: &mut String) -> Option<String> {
    if let Value::String(marker) = expected {
        if marker == IGNORE_DIFF {
            return None;
        }
    }

    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            if expected.len() != actual.len() || expected.keys().any(|key| !actual.contains_key(key))
            {
                return Some(path.clone());
            }
            for (key, expected_value) in expected {
                let len = path.len();
                path.push('.');
                path.push_str(key);
                let diff = first_difference(expected_value, &actual[key], path);
                path.truncate(len);
                if diff.is_some() {
                    return diff;
                }
            }
            None
        }
        (Value::Array(expected), Value::Array(actual)) => {
            if expected.len() != actual.len() {
                return Some(path.clone());
            }
            for (idx, (expected_value, actual_value)) in expected.iter().zip(actual).enumerate() {
                let len = path.len();
                path.push_str(&format!("[{idx}]"));
                let diff = first_difference(expected_value, actual_value, path);
                path.truncate(len);
                if diff.is_some() {
                    return diff;
                }
            }
            None
        }
        (Value::Number(expected), Value::Number(actual)) => {
            let equal = match (expected.as_i64(), actual.as_i64()) {
                (Some(left), Some(right)) => left == right,
                _ => match (expected.as_u64(), actual.as_u64()) {
                    (Some(left), Some(right)) => left == right,
                    _ => expected.as_f64() == actual.as_f64(),
                },
            };
            (!equal).then(|| path.clone())
        }
        (expected, actual) => (expected != actual).then(|| path.clone()),
    }
}

fn clip(bytes: &[u8]) -> String {
    let capped = &bytes[..bytes.len().min(MAX_DIAGNOSTIC_BYTES)];
    String::from_utf8_lossy(capped).into_owned()
}
