use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::time::Duration;

use crate::http::method::HttpMethod;
use crate::http::status::describe_status;

/// Name of the service addressed when a step names none.
pub const DEFAULT_SERVICE: &str = "default";

// ─── Bodies ───────────────────────────────────────────────────────────────────

/// How a declared body is compared against the received one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyMode {
    /// JSON when both sides parse (leniently for the expected side), bytes otherwise.
    #[default]
    Auto,
    /// Always attempt a JSON tree comparison first.
    Json,
    /// Verbatim byte comparison.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySpec {
    pub bytes: Bytes,
    pub mode: BodyMode,
}

impl BodySpec {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            mode: BodyMode::Auto,
        }
    }

    pub fn json(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            mode: BodyMode::Json,
        }
    }

    pub fn text(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            mode: BodyMode::Text,
        }
    }
}

// ─── Expectations ─────────────────────────────────────────────────────────────

/// Identity shared by structurally identical expectations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpectationKey {
    pub method: String,
    pub uri: String,
    pub service: String,
}

impl ExpectationKey {
    /// Builds a key with an upper-cased method and a canonical query order.
    pub fn new(method: &str, uri: &str, service: &str) -> Self {
        Self {
            method: method.trim().to_ascii_uppercase(),
            uri: canonical_uri(uri),
            service: service.to_string(),
        }
    }
}

impl Display for ExpectationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} for {}", self.method, self.uri, self.service)
    }
}

/// Sorts query parameters so that `?b=2&a=1` and `?a=1&b=2` address the same key.
pub fn canonical_uri(uri: &str) -> String {
    let uri = uri.trim();
    let Some((path, query)) = uri.split_once('?') else {
        return uri.to_string();
    };

    let mut pairs: Vec<&str> = query.split('&').filter(|pair| !pair.is_empty()).collect();
    if pairs.is_empty() {
        return path.to_string();
    }
    pairs.sort_by(|left, right| {
        let left_key = left.split_once('=').map_or(*left, |(key, _)| key);
        let right_key = right.split_once('=').map_or(*right, |(key, _)| key);
        left_key.cmp(right_key).then_with(|| left.cmp(right))
    });

    format!("{path}?{}", pairs.join("&"))
}

/// A single registered request/response pairing, consumed at most once.
#[derive(Debug, Clone)]
pub struct Expectation {
    pub service: String,
    pub method: HttpMethod,
    pub uri: String,
    pub request_headers: BTreeMap<String, String>,
    pub request_cookies: BTreeMap<String, String>,
    pub request_body: Option<BodySpec>,
    pub status: u16,
    pub response_headers: BTreeMap<String, String>,
    pub response_body: Bytes,
}

impl Expectation {
    pub fn new(method: HttpMethod, uri: impl Into<String>) -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            method,
            uri: uri.into(),
            request_headers: BTreeMap::new(),
            request_cookies: BTreeMap::new(),
            request_body: None,
            status: 200,
            response_headers: BTreeMap::new(),
            response_body: Bytes::new(),
        }
    }

    pub fn on_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_request_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_request_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_request_body(mut self, body: BodySpec) -> Self {
        self.request_body = Some(body);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_response_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_response_body(mut self, body: impl Into<Bytes>) -> Self {
        self.response_body = body.into();
        self
    }

    pub fn key(&self) -> ExpectationKey {
        ExpectationKey::new(&self.method.to_string(), &self.uri, &self.service)
    }

    pub fn response(&self) -> MockResponse {
        MockResponse {
            status: self.status,
            headers: self.response_headers.clone(),
            body: self.response_body.clone(),
        }
    }

    /// One-line description used in pending-expectation reports.
    pub fn describe(&self) -> String {
        format!(
            "{} {} for {} responding {}",
            self.method,
            canonical_uri(&self.uri),
            self.service,
            describe_status(self.status)
        )
    }
}

// ─── Mock wire shapes ─────────────────────────────────────────────────────────

/// A request as seen by the mock side.
#[derive(Debug, Clone, Default)]
pub struct MockRequest {
    pub service: String,
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub cookies: BTreeMap<String, String>,
    pub body: Bytes,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl MockResponse {
    /// Best-effort reply used when a request could not be matched.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());
        Self {
            status: 500,
            headers,
            body: Bytes::from(message.into()),
        }
    }
}

// ─── Captured values ──────────────────────────────────────────────────────────

/// Scalar bound to a name for the rest of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

impl CapturedValue {
    /// Converts a JSON scalar; objects and arrays are not capturable.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Number(n) => Some(Self::Number(n.clone())),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// JSON literal form: strings are quoted, everything else is bare.
    pub fn to_json_literal(&self) -> String {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()).to_string(),
            other => other.to_string(),
        }
    }
}

impl Display for CapturedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => write!(f, "null"),
        }
    }
}

// ─── Services & probes ────────────────────────────────────────────────────────

/// Logical service name to base URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRegistry {
    urls: BTreeMap<String, String>,
}

impl ServiceRegistry {
    pub fn new(default_url: &str) -> Self {
        let mut urls = BTreeMap::new();
        urls.insert(DEFAULT_SERVICE.to_string(), trim_base(default_url));
        Self { urls }
    }

    pub fn with_service(mut self, name: &str, url: &str) -> Self {
        self.urls.insert(name.to_string(), trim_base(url));
        self
    }

    pub fn url(&self, name: &str) -> Option<&str> {
        self.urls.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.urls.keys().map(String::as_str)
    }

    /// Finds the service owning `url`, preferring the longest base URL, and
    /// returns it with the remaining path and query.
    pub fn resolve_url<'a>(&self, url: &'a str) -> Option<(&str, &'a str)> {
        self.urls
            .iter()
            .filter(|(_, base)| {
                url.starts_with(base.as_str())
                    && matches!(url.as_bytes().get(base.len()), None | Some(b'/' | b'?'))
            })
            .max_by_key(|(_, base)| base.len())
            .map(|(name, base)| (name.as_str(), &url[base.len()..]))
    }
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Fan-out and deadline for an idempotency probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyPlan {
    pub level: usize,
    pub timeout: Duration,
}

impl ConcurrencyPlan {
    pub fn new(level: usize, timeout: Duration) -> Self {
        Self {
            level: level.max(1),
            timeout,
        }
    }
}
