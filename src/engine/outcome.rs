//! Client-side response assertions.
//!
//! A request may yield several responses when it was issued as an
//! idempotency probe. Exactly one of them must satisfy the main assertions;
//! every other one must satisfy the "other responses" assertions, or the main
//! ones when none were declared.

use serde_json::Value;

use crate::domain::BodySpec;
use crate::engine::body::{self, parse_strict};
use crate::engine::vars::lookup_path;
use crate::error::{Error, Result};
use crate::http::response::HttpResponse;
use crate::http::status::describe_status;

/// Assertions declared against one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseExpectation {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Option<BodySpec>,
    /// `(path, value)` pairs checked against the parsed JSON body.
    pub json_paths: Vec<(String, Value)>,
}

impl ResponseExpectation {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.headers.is_empty()
            && self.body.is_none()
            && self.json_paths.is_empty()
    }

    /// Returns the first unmet assertion, described with expected and received values.
    pub fn check(&self, response: &HttpResponse) -> std::result::Result<(), String> {
        if let Some(status) = self.status {
            if status != response.status {
                return Err(format!(
                    "unexpected response status, expected: {}, received: {}",
                    describe_status(status),
                    describe_status(response.status)
                ));
            }
        }

        for (name, expected) in &self.headers {
            let actual = response.header(name);
            if actual != Some(expected.as_str()) {
                return Err(format!(
                    "unexpected response header {name}, expected: {expected}, received: {}",
                    actual.unwrap_or("<none>")
                ));
            }
        }

        if let Some(spec) = &self.body {
            body::compare(spec, &response.body, response.content_type())
                .map_err(|err| format!("unexpected response {err}"))?;
        }

        if !self.json_paths.is_empty() {
            let tree = parse_strict(&response.body).ok_or_else(|| {
                format!(
                    "unexpected response body, expected JSON, received: {}",
                    response.body_text()
                )
            })?;
            for (path, expected) in &self.json_paths {
                match lookup_path(&tree, path) {
                    Some(actual) if body::json_matches(expected, actual) => {}
                    Some(actual) => {
                        return Err(format!(
                            "unexpected value at {path}, expected: {expected}, received: {actual}"
                        ));
                    }
                    None => {
                        return Err(format!(
                            "unexpected value at {path}, expected: {expected}, received: <missing>"
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Parses a table cell: JSON when it parses, a plain string otherwise.
pub fn cell_value(cell: &str) -> Value {
    serde_json::from_str(cell.trim()).unwrap_or_else(|_| Value::String(cell.to_string()))
}

/// Index of a response satisfying `main`, for step-by-step assertions.
pub fn find_matching(
    service: &str,
    responses: &[HttpResponse],
    main: &ResponseExpectation,
) -> Result<usize> {
    let Some(first) = responses.first() else {
        return Err(Error::ResponseMismatch(format!(
            "no response received for {service}"
        )));
    };

    let mut first_failure = None;
    for (idx, response) in responses.iter().enumerate() {
        match main.check(response) {
            Ok(()) => return Ok(idx),
            Err(reason) => {
                first_failure.get_or_insert(reason);
            }
        }
    }

    let reason = first_failure.unwrap_or_else(|| first.summary());
    Err(Error::ResponseMismatch(if responses.len() > 1 {
        format!("no response for {service} matched: {reason}")
    } else {
        reason
    }))
}

/// Verifies the whole response set: one main response, the rest "other".
pub fn verify_outcomes(
    service: &str,
    responses: &[HttpResponse],
    main: &ResponseExpectation,
    other: Option<&ResponseExpectation>,
) -> Result<usize> {
    find_matching(service, responses, main)?;

    let rest = other.unwrap_or(main);
    let candidates: Vec<usize> = (0..responses.len())
        .filter(|&idx| main.check(&responses[idx]).is_ok())
        .collect();

    let mut reported = None;
    for &candidate in &candidates {
        let failure = responses
            .iter()
            .enumerate()
            .filter(|&(idx, _)| idx != candidate)
            .find_map(|(_, response)| rest.check(response).err());
        match failure {
            None => return Ok(candidate),
            Some(reason) => {
                reported.get_or_insert(reason);
            }
        }
    }

    let reason = reported.unwrap_or_default();
    Err(Error::ResponseMismatch(match other {
        Some(_) => format!("unexpected other response for {service}: {reason}"),
        None => format!("no other responses expected for {service}: {reason}"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Bytes::from(body.to_string()),
            duration_ms: 0,
        }
    }

    fn status(code: u16) -> ResponseExpectation {
        ResponseExpectation {
            status: Some(code),
            ..ResponseExpectation::default()
        }
    }

    #[test]
    fn check_reports_first_unmet_assertion() {
        let mut exp = status(200);
        exp.headers.push(("content-type".to_string(), "application/json".to_string()));
        exp.body = Some(BodySpec::new(r#"[{"some":"json"}]"#));
        assert!(exp.check(&response(200, r#"[ {"some": "json"} ]"#)).is_ok());

        let reason = exp.check(&response(404, "")).unwrap_err();
        assert_eq!(
            reason,
            "unexpected response status, expected: 200 (OK), received: 404 (Not Found)"
        );

        let reason = exp.check(&response(200, r#"[{"some":"other"}]"#)).unwrap_err();
        assert!(reason.starts_with("unexpected response body mismatch at $[0].some"));
    }

    #[test]
    fn json_path_table() {
        let exp = ResponseExpectation {
            json_paths: vec![
                ("$.id".to_string(), cell_value("12345")),
                ("name".to_string(), cell_value("John Doe")),
                ("tags[0]".to_string(), cell_value("\"a\"")),
                ("created".to_string(), cell_value("\"<ignore-diff>\"")),
            ],
            ..ResponseExpectation::default()
        };
        let body = r#"{"id":12345,"name":"John Doe","tags":["a"],"created":"2024-01-01"}"#;
        assert!(exp.check(&response(200, body)).is_ok());

        let reason = exp
            .check(&response(200, r#"{"id":1,"name":"John Doe","tags":["a"],"created":0}"#))
            .unwrap_err();
        assert_eq!(reason, "unexpected value at $.id, expected: 12345, received: 1");

        let reason = exp.check(&response(200, "{\"id\":12345,} // x")).unwrap_err();
        assert!(reason.starts_with("unexpected response body, expected JSON"));
    }

    #[test]
    fn single_response_must_match_main() {
        let responses = vec![response(404, "")];
        let err = verify_outcomes("default", &responses, &status(204), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected response status, expected: 204 (No Content), received: 404 (Not Found)"
        );
    }

    #[test]
    fn probe_without_other_expectation_fails_on_duplicates() {
        let responses = vec![response(404, ""), response(204, ""), response(404, "")];
        let err = verify_outcomes("default", &responses, &status(204), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no other responses expected for default: unexpected response status, \
             expected: 204 (No Content), received: 404 (Not Found)"
        );
    }

    #[test]
    fn probe_with_other_expectation_passes_in_any_order() {
        let responses = vec![
            response(404, r#"{"status":"failed"}"#),
            response(204, ""),
            response(404, r#"{"status":"failed"}"#),
        ];
        let mut other = status(404);
        other.body = Some(BodySpec::new(r#"{"status":"failed"}"#));

        assert_eq!(
            verify_outcomes("default", &responses, &status(204), Some(&other)).unwrap(),
            1
        );

        let two_main = vec![response(204, ""), response(204, "")];
        let err = verify_outcomes("default", &two_main, &status(204), Some(&other)).unwrap_err();
        assert!(err.to_string().starts_with("unexpected other response for default"));
    }

    #[test]
    fn empty_response_set_is_reported() {
        let err = find_matching("some-service", &[], &status(200)).unwrap_err();
        assert_eq!(err.to_string(), "no response received for some-service");
    }
}
