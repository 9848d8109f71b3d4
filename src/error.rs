//! Error types shared by the expectation engine and the step bridge.

use crate::config::ConfigError;

/// Result type for engine and step operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while matching, probing, capturing or finishing a scenario.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A request arrived and no queued expectation exists for its key.
    #[error("{}", no_expectation_message(.method, .uri, .service, .exhausted))]
    NoExpectation {
        method: String,
        uri: String,
        service: String,
        /// The key was registered before and every entry was already consumed.
        exhausted: bool,
    },

    /// The head expectation for the key rejected the request constraints.
    #[error("unexpected request {method} {uri} for {service}: {reason}")]
    UnexpectedRequest {
        method: String,
        uri: String,
        service: String,
        reason: String,
    },

    /// Expectations were registered but never consumed.
    #[error("expectations were not met: {}", .0.join("; "))]
    PendingExpectations(Vec<String>),

    #[error("failed to capture {name}: nothing found at {path}")]
    CaptureNotFound { name: String, path: String },

    #[error("unresolved placeholder {{{{{0}}}}}")]
    UnresolvedPlaceholder(String),

    #[error("probe call {uri} exceeded deadline of {timeout_ms} ms")]
    ProbeTimeout { uri: String, timeout_ms: u64 },

    /// A received response did not satisfy the declared assertions.
    #[error("{0}")]
    ResponseMismatch(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid step: {0}")]
    InvalidStep(String),

    /// Every failure collected while finishing a scenario.
    #[error("{}", join_errors(.0))]
    Scenario(Vec<Error>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn no_expectation_message(method: &str, uri: &str, service: &str, exhausted: &bool) -> String {
    if *exhausted {
        format!("unexpected request {method} {uri}: no other responses expected for {service}")
    } else {
        format!("unexpected request {method} {uri}: no expectation registered for {service}")
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Flattens nested scenario aggregates into a single list.
    pub fn into_list(self) -> Vec<Error> {
        match self {
            Error::Scenario(errors) => errors.into_iter().flat_map(Error::into_list).collect(),
            other => vec![other],
        }
    }

    /// Returns true if this is a missing-expectation error.
    pub fn is_no_expectation(&self) -> bool {
        matches!(self, Error::NoExpectation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_expectation_names_method_and_uri() {
        let err = Error::NoExpectation {
            method: "GET".into(),
            uri: "/get-something?foo=bar".into(),
            service: "default".into(),
            exhausted: false,
        };
        assert_eq!(
            err.to_string(),
            "unexpected request GET /get-something?foo=bar: no expectation registered for default"
        );
    }

    #[test]
    fn exhausted_queue_reports_no_other_responses() {
        let err = Error::NoExpectation {
            method: "DELETE".into(),
            uri: "/delete-something".into(),
            service: "some-service".into(),
            exhausted: true,
        };
        assert!(
            err.to_string()
                .ends_with("no other responses expected for some-service")
        );
    }

    #[test]
    fn unresolved_placeholder_shows_marker() {
        let err = Error::UnresolvedPlaceholder("user_id".into());
        assert_eq!(err.to_string(), "unresolved placeholder {{user_id}}");
    }

    #[test]
    fn scenario_errors_flatten() {
        let err = Error::Scenario(vec![
            Error::InvalidStep("a".into()),
            Error::Scenario(vec![Error::Transport("b".into())]),
        ]);
        let list = err.into_list();
        assert_eq!(list.len(), 2);
        assert!(matches!(list[1], Error::Transport(_)));
    }
}
