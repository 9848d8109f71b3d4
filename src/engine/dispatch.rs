//! Request matching for the mock side.
//!
//! Every inbound request gets an HTTP response. Failed matches are answered
//! with a 500 and recorded in the dispatch log, which the scenario teardown
//! inspects together with the drain check.

use std::sync::{Mutex, PoisonError};

use crate::domain::{DEFAULT_SERVICE, Expectation, ExpectationKey, MockRequest, MockResponse, canonical_uri};
use crate::engine::store::ExpectationStore;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Matched { key: ExpectationKey, status: u16 },
    /// Head expectation existed but rejected the request.
    Mismatched(Error),
    NoExpectation(Error),
}

impl DispatchOutcome {
    pub fn failure(&self) -> Option<&Error> {
        match self {
            DispatchOutcome::Matched { .. } => None,
            DispatchOutcome::Mismatched(err) | DispatchOutcome::NoExpectation(err) => Some(err),
        }
    }
}

/// Side channel collecting every dispatch outcome.
#[derive(Debug, Default)]
pub struct DispatchLog {
    entries: Mutex<Vec<DispatchOutcome>>,
}

impl DispatchLog {
    pub fn record(&self, outcome: DispatchOutcome) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }

    pub fn outcomes(&self) -> Vec<DispatchOutcome> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn failures(&self) -> Vec<Error> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(DispatchOutcome::failure)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[derive(Default)]
pub struct Dispatcher {
    store: ExpectationStore,
    log: DispatchLog,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(&self, expectation: Expectation) {
        self.store.register(expectation);
    }

    pub fn store(&self) -> &ExpectationStore {
        &self.store
    }

    pub fn log(&self) -> &DispatchLog {
        &self.log
    }

    /// Resolves a request against the store; never fails.
    pub fn dispatch(&self, mut request: MockRequest) -> MockResponse {
        request.method = request.method.trim().to_ascii_uppercase();
        request.uri = canonical_uri(&request.uri);
        if request.service.is_empty() {
            request.service = DEFAULT_SERVICE.to_string();
        }

        match self.store.consume(&request) {
            Ok(response) => {
                tracing::debug!(
                    method = %request.method,
                    uri = %request.uri,
                    service = %request.service,
                    status = response.status,
                    "matched expectation"
                );
                self.log.record(DispatchOutcome::Matched {
                    key: ExpectationKey::new(&request.method, &request.uri, &request.service),
                    status: response.status,
                });
                response
            }
            Err(err) => {
                tracing::warn!(error = %err, "request did not match");
                let response = MockResponse::failure(err.to_string());
                let outcome = match err {
                    Error::UnexpectedRequest { .. } => DispatchOutcome::Mismatched(err),
                    other => DispatchOutcome::NoExpectation(other),
                };
                self.log.record(outcome);
                response
            }
        }
    }

    /// Recorded failures followed by the drain check.
    pub fn finish(&self) -> Result<()> {
        let mut errors = self.log.failures();
        if let Err(err) = self.store.assert_drained() {
            errors.push(err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Scenario(errors))
        }
    }

    pub fn reset(&self) {
        self.store.reset();
        self.log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::method::HttpMethod;

    fn request(method: &str, uri: &str) -> MockRequest {
        MockRequest {
            method: method.to_string(),
            uri: uri.to_string(),
            ..MockRequest::default()
        }
    }

    #[test]
    fn dispatch_normalizes_before_matching() {
        let dispatcher = Dispatcher::new();
        dispatcher.expect(Expectation::new(HttpMethod::Get, "/x?a=1&b=2").with_response_body("ok"));

        let response = dispatcher.dispatch(request("get", "/x?b=2&a=1"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_ref(), b"ok");
        assert!(dispatcher.finish().is_ok());
    }

    #[test]
    fn unmatched_request_gets_a_response_and_is_recorded() {
        let dispatcher = Dispatcher::new();
        let response = dispatcher.dispatch(request("GET", "/missing"));
        assert_eq!(response.status, 500);

        let outcomes = dispatcher.log().outcomes();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], DispatchOutcome::NoExpectation(_)));

        let err = dispatcher.finish().unwrap_err();
        assert!(err.to_string().contains("GET /missing"));
    }

    #[test]
    fn finish_combines_mismatches_and_pending() {
        let dispatcher = Dispatcher::new();
        dispatcher.expect(Expectation::new(HttpMethod::Post, "/p").with_request_header("X-Foo", "bar"));

        let response = dispatcher.dispatch(request("POST", "/p"));
        assert_eq!(response.status, 500);

        let errors = dispatcher.finish().unwrap_err().into_list();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], Error::UnexpectedRequest { .. }));
        assert!(matches!(errors[1], Error::PendingExpectations(_)));

        dispatcher.reset();
        assert!(dispatcher.finish().is_ok());
    }
}
