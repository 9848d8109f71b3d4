//! Scenario-scoped captured values and `{{name}}` substitution.

use serde_json::Value;
use std::collections::HashMap;

use crate::domain::CapturedValue;
use crate::engine::body::parse_strict;
use crate::error::{Error, Result};
use crate::http::response::HttpResponse;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Where a captured value is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Dot/bracket path into the JSON body, e.g. `$.items[0].id`.
    Body(String),
    Status,
    Header(String),
}

impl CaptureSource {
    /// `status`, `header <Name>` (or `header:<Name>`), anything else is a body path.
    pub fn parse(field: &str) -> Self {
        let field = field.trim();
        if field.eq_ignore_ascii_case("status") {
            return CaptureSource::Status;
        }
        let lower = field.to_ascii_lowercase();
        if lower.starts_with("header ") || lower.starts_with("header:") {
            return CaptureSource::Header(field[7..].trim().to_string());
        }
        CaptureSource::Body(field.to_string())
    }

    fn describe(&self) -> String {
        match self {
            CaptureSource::Body(path) => path.clone(),
            CaptureSource::Status => "status".to_string(),
            CaptureSource::Header(name) => format!("header {name}"),
        }
    }
}

/// Values captured during one scenario. A fresh context is created for each
/// scenario; captures only accumulate or overwrite.
#[derive(Debug, Clone, Default)]
pub struct VarContext {
    values: HashMap<String, CapturedValue>,
}

impl VarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: CapturedValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&CapturedValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capture(
        &mut self,
        name: &str,
        response: &HttpResponse,
        source: &CaptureSource,
    ) -> Result<CapturedValue> {
        let not_found = || Error::CaptureNotFound {
            name: name.to_string(),
            path: source.describe(),
        };

        let value = match source {
            CaptureSource::Status => {
                CapturedValue::Number(serde_json::Number::from(response.status))
            }
            CaptureSource::Header(header) => CapturedValue::String(
                response.header(header).ok_or_else(not_found)?.to_string(),
            ),
            CaptureSource::Body(path) => {
                let tree = parse_strict(&response.body).ok_or_else(not_found)?;
                let found = lookup_path(&tree, path).ok_or_else(not_found)?;
                CapturedValue::from_json(found).ok_or_else(not_found)?
            }
        };

        tracing::debug!(name, value = %value, "captured value");
        self.set(name, value.clone());
        Ok(value)
    }

    /// Replaces every `{{name}}` with the captured value's string form.
    pub fn resolve(&self, text: &str) -> Result<String> {
        self.substitute(text, false)
    }

    /// Like [`resolve`](Self::resolve), but a quoted `"{{name}}"` becomes the
    /// value's JSON literal, so numbers and booleans keep their type.
    pub fn resolve_json(&self, text: &str) -> Result<String> {
        self.substitute(text, true)
    }

    fn substitute(&self, text: &str, json: bool) -> Result<String> {
        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;

        while let Some(offset) = text[cursor..].find(OPEN) {
            let start = cursor + offset;
            let Some(close) = text[start + OPEN.len()..].find(CLOSE) else {
                break;
            };
            let end = start + OPEN.len() + close;
            let name = text[start + OPEN.len()..end].trim();
            let value = self
                .values
                .get(name)
                .ok_or_else(|| Error::UnresolvedPlaceholder(name.to_string()))?;

            let after = end + CLOSE.len();
            let quoted = json
                && start > cursor
                && text[..start].ends_with('"')
                && text[after..].starts_with('"');
            if quoted {
                output.push_str(&text[cursor..start - 1]);
                output.push_str(&value.to_json_literal());
                cursor = after + 1;
            } else {
                output.push_str(&text[cursor..start]);
                output.push_str(&value.to_string());
                cursor = after;
            }
        }

        output.push_str(&text[cursor..]);
        Ok(output)
    }
}

/// Looks up `$.a.b[0]`, `a.b[0]` or `[0].a` in a JSON tree.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);

    let mut current = value;
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(after_dot) = rest.strip_prefix('.') {
            rest = after_dot;
            continue;
        }

        if let Some(after_bracket) = rest.strip_prefix('[') {
            let close = after_bracket.find(']')?;
            let token = after_bracket[..close].trim();
            rest = &after_bracket[close + 1..];
            current = match token.parse::<usize>() {
                Ok(idx) => current.as_array()?.get(idx)?,
                Err(_) => current
                    .as_object()?
                    .get(token.trim_matches(|c| c == '"' || c == '\''))?,
            };
            continue;
        }

        let end = rest.find(['.', '[']).unwrap_or(rest.len());
        let key = &rest[..end];
        rest = &rest[end..];
        current = current.as_object()?.get(key)?;
    }

    Some(current)
}
