//! Step text patterns and their typed calls.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::DEFAULT_SERVICE;
use crate::engine::vars::VarContext;
use crate::error::{Error, Result};
use crate::http::method::HttpMethod;
use crate::http::status::parse_status;

/// A step resolved into typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCall {
    // client side
    Request { service: String, method: HttpMethod, uri: String },
    RequestBody { service: String },
    RequestBodyFile { service: String, path: String },
    RequestHeader { service: String, name: String, value: String },
    RequestCookie { service: String, name: String, value: String },
    Concurrently { service: String, times: Option<usize> },
    ResponseStatus { service: String, other: bool, status: u16 },
    ResponseHeader { service: String, other: bool, name: String, value: String },
    ResponseBody { service: String, other: bool },
    ResponseBodyFile { service: String, other: bool, path: String },
    ResponseJsonPaths { service: String },
    Capture { service: String, field: String, name: String },

    // mock side
    RegisterExpectation { service: String, method: HttpMethod, path: String, status: u16, with_body: bool },
    MockReceives { service: String, method: HttpMethod, uri: String },
    MockRequestHeader { service: String, name: String, value: String },
    MockRequestCookie { service: String, name: String, value: String },
    MockRequestBody { service: String },
    MockTimes { service: String, times: usize },
    MockResponseHeader { service: String, name: String, value: String },
    MockResponseStatus { service: String, status: u16, with_body: bool },

    ServiceAvailable { name: String, url: String },
}

impl StepCall {
    /// Steps that extend the expectation currently being declared for a service.
    pub fn continues_mock(&self) -> bool {
        matches!(
            self,
            StepCall::MockRequestHeader { .. }
                | StepCall::MockRequestCookie { .. }
                | StepCall::MockRequestBody { .. }
                | StepCall::MockTimes { .. }
                | StepCall::MockResponseHeader { .. }
                | StepCall::MockResponseStatus { .. }
        )
    }
}

/// Capture groups of a matched step, indexed by group number.
#[derive(Debug, Clone)]
pub struct Args(Vec<Option<String>>);

impl Args {
    fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).and_then(|value| value.as_deref())
    }

    fn text(&self, idx: usize) -> String {
        self.get(idx).unwrap_or_default().to_string()
    }

    fn service(&self, idx: usize) -> String {
        self.get(idx).unwrap_or(DEFAULT_SERVICE).to_string()
    }

    fn flag(&self, idx: usize) -> bool {
        self.get(idx).is_some()
    }

    fn method(&self, idx: usize) -> Result<HttpMethod> {
        self.text(idx).parse()
    }

    fn status(&self, idx: usize) -> Result<u16> {
        parse_status(&self.text(idx))
    }

    fn count(&self, idx: usize) -> Result<usize> {
        let text = self.text(idx);
        match text.parse() {
            Ok(count) if count <= MAX_COUNT => Ok(count),
            Ok(_) => Err(Error::InvalidStep(format!(
                "count {text} is above the limit of {MAX_COUNT}"
            ))),
            Err(_) => Err(Error::InvalidStep(format!("`{text}` is not a count"))),
        }
    }

    /// Substitutes captured values into every argument.
    pub fn resolve(self, vars: &VarContext) -> Result<Self> {
        self.0
            .into_iter()
            .map(|value| value.map(|text| vars.resolve(&text)).transpose())
            .collect::<Result<Vec<_>>>()
            .map(Args)
    }
}

type Build = fn(&Args) -> Result<StepCall>;

pub struct StepDef {
    pub pattern: String,
    regex: Regex,
    build: Build,
}

impl StepDef {
    pub fn build(&self, args: &Args) -> Result<StepCall> {
        (self.build)(args)
    }
}

fn step(pattern: impl Into<String>, build: Build) -> (String, Build) {
    (pattern.into(), build)
}

/// Upper bound for repeat and concurrency counts given in step text.
pub const MAX_COUNT: usize = 1_000;

const SERVICE: &str = r#"(?:"([^"]*)" )?"#;

static STEPS: LazyLock<std::result::Result<Vec<StepDef>, regex::Error>> = LazyLock::new(|| {
    let definitions = vec![
        step(
            format!(r#"^I request {SERVICE}HTTP endpoint with method "([^"]*)" and URI "([^"]*)"$"#),
            |a| Ok(StepCall::Request { service: a.service(1), method: a.method(2)?, uri: a.text(3) }),
        ),
        step(
            format!(r#"^I request {SERVICE}HTTP endpoint with body$"#),
            |a| Ok(StepCall::RequestBody { service: a.service(1) }),
        ),
        step(
            format!(r#"^I request {SERVICE}HTTP endpoint with body from file "([^"]*)"$"#),
            |a| Ok(StepCall::RequestBodyFile { service: a.service(1), path: a.text(2) }),
        ),
        step(
            format!(r#"^I request {SERVICE}HTTP endpoint with header "([^"]*)" and value "([^"]*)"$"#),
            |a| Ok(StepCall::RequestHeader { service: a.service(1), name: a.text(2), value: a.text(3) }),
        ),
        step(
            format!(r#"^I request {SERVICE}HTTP endpoint with cookie "([^"]*)" and value "([^"]*)"$"#),
            |a| Ok(StepCall::RequestCookie { service: a.service(1), name: a.text(2), value: a.text(3) }),
        ),
        step(
            format!(r#"^I concurrently request idempotent {SERVICE}HTTP endpoint(?: (\d+) times)?$"#),
            |a| {
                let times = match a.get(2) {
                    Some(_) => Some(a.count(2)?),
                    None => None,
                };
                Ok(StepCall::Concurrently { service: a.service(1), times })
            },
        ),
        step(
            format!(r#"^I should have {SERVICE}(response|other responses) with status "([^"]*)"$"#),
            |a| {
                Ok(StepCall::ResponseStatus {
                    service: a.service(1),
                    other: a.get(2) == Some("other responses"),
                    status: a.status(3)?,
                })
            },
        ),
        step(
            format!(r#"^I should have {SERVICE}(response|other responses) with header "([^"]*)" and value "([^"]*)"$"#),
            |a| {
                Ok(StepCall::ResponseHeader {
                    service: a.service(1),
                    other: a.get(2) == Some("other responses"),
                    name: a.text(3),
                    value: a.text(4),
                })
            },
        ),
        step(
            format!(r#"^I should have {SERVICE}(response|other responses) with body$"#),
            |a| Ok(StepCall::ResponseBody { service: a.service(1), other: a.get(2) == Some("other responses") }),
        ),
        step(
            format!(r#"^I should have {SERVICE}(response|other responses) with body from file "([^"]*)"$"#),
            |a| {
                Ok(StepCall::ResponseBodyFile {
                    service: a.service(1),
                    other: a.get(2) == Some("other responses"),
                    path: a.text(3),
                })
            },
        ),
        step(
            format!(r#"^I should have {SERVICE}response with body, that matches JSON paths$"#),
            |a| Ok(StepCall::ResponseJsonPaths { service: a.service(1) }),
        ),
        step(
            format!(r#"^I capture field "([^"]*)" from the last {SERVICE}response as "([^"]*)"$"#),
            |a| Ok(StepCall::Capture { field: a.text(1), service: a.service(2), name: a.text(3) }),
        ),
        step(
            r#"^I register an expectation(?: on "([^"]*)")? for method "([^"]*)" at path "([^"]*)" returning status "([^"]*)"( with body)?$"#,
            |a| {
                Ok(StepCall::RegisterExpectation {
                    service: a.service(1),
                    method: a.method(2)?,
                    path: a.text(3),
                    status: a.status(4)?,
                    with_body: a.flag(5),
                })
            },
        ),
        step(
            r#"^"([^"]*)" receives "([^"]*)" request "([^"]*)"$"#,
            |a| Ok(StepCall::MockReceives { service: a.service(1), method: a.method(2)?, uri: a.text(3) }),
        ),
        step(
            r#"^"([^"]*)" request includes header "([^"]*)" and value "([^"]*)"$"#,
            |a| Ok(StepCall::MockRequestHeader { service: a.service(1), name: a.text(2), value: a.text(3) }),
        ),
        step(
            r#"^"([^"]*)" request includes cookie "([^"]*)" and value "([^"]*)"$"#,
            |a| Ok(StepCall::MockRequestCookie { service: a.service(1), name: a.text(2), value: a.text(3) }),
        ),
        step(
            r#"^"([^"]*)" request is received with body$"#,
            |a| Ok(StepCall::MockRequestBody { service: a.service(1) }),
        ),
        step(
            r#"^"([^"]*)" request is received (\d+) times$"#,
            |a| Ok(StepCall::MockTimes { service: a.service(1), times: a.count(2)? }),
        ),
        step(
            r#"^"([^"]*)" responds with header "([^"]*)" and value "([^"]*)"$"#,
            |a| Ok(StepCall::MockResponseHeader { service: a.service(1), name: a.text(2), value: a.text(3) }),
        ),
        step(
            r#"^"([^"]*)" responds with status "([^"]*)"( and body)?$"#,
            |a| {
                Ok(StepCall::MockResponseStatus {
                    service: a.service(1),
                    status: a.status(2)?,
                    with_body: a.flag(3),
                })
            },
        ),
        step(
            r#"^service "([^"]*)" is available at "([^"]*)"$"#,
            |a| Ok(StepCall::ServiceAvailable { name: a.text(1), url: a.text(2) }),
        ),
    ];

    definitions
        .into_iter()
        .map(|(pattern, build)| {
            let regex = Regex::new(&pattern)?;
            Ok(StepDef {
                pattern,
                regex,
                build,
            })
        })
        .collect()
});

fn definitions() -> Result<&'static [StepDef]> {
    STEPS
        .as_ref()
        .map(Vec::as_slice)
        .map_err(|err| Error::InvalidStep(format!("step pattern failed to compile: {err}")))
}

/// Every supported step pattern, in matching order.
pub fn step_patterns() -> Result<Vec<&'static str>> {
    Ok(definitions()?.iter().map(|def| def.pattern.as_str()).collect())
}

/// Finds the step definition for `text`; Gherkin keywords are ignored.
pub fn match_step(text: &str) -> Result<(&'static StepDef, Args)> {
    let text = strip_keyword(text.trim());
    for def in definitions()? {
        if let Some(captures) = def.regex.captures(text) {
            let args = captures
                .iter()
                .map(|group| group.map(|group| group.as_str().to_string()))
                .collect();
            return Ok((def, Args(args)));
        }
    }
    Err(Error::InvalidStep(format!("no step matches `{text}`")))
}

fn strip_keyword(text: &str) -> &str {
    for keyword in ["Given ", "When ", "Then ", "And ", "But ", "* "] {
        if let Some(rest) = text.strip_prefix(keyword) {
            return rest.trim_start();
        }
    }
    text
}
