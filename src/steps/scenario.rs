//! Per-scenario context driven by step text.
//!
//! A scenario owns its expectation store, dispatch log, captured values and
//! client requests. Nothing is shared with other scenarios apart from the
//! read-only suite configuration.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SuiteConfig;
use crate::domain::{BodySpec, ConcurrencyPlan, Expectation, ServiceRegistry};
use crate::engine::body::normalize_body;
use crate::engine::dispatch::Dispatcher;
use crate::engine::outcome::{ResponseExpectation, cell_value, find_matching, verify_outcomes};
use crate::engine::probe::probe_idempotent;
use crate::engine::vars::{CaptureSource, VarContext};
use crate::error::{Error, Result};
use crate::http::client::{LocalTransport, Transport};
use crate::http::method::HttpMethod;
use crate::http::request::OutboundRequest;
use crate::http::response::HttpResponse;

use super::argument::StepArgument;
use super::table::{self, StepCall};

// ─── Client requests ──────────────────────────────────────────────────────────

/// A request declared by client steps, sent on its first assertion.
struct RequestState {
    request: OutboundRequest,
    concurrency: Option<usize>,
    responses: Option<Vec<HttpResponse>>,
    /// Sending or an assertion already failed and was reported by the step.
    failed: bool,
    main: ResponseExpectation,
    other: Option<ResponseExpectation>,
}

impl RequestState {
    fn new(request: OutboundRequest) -> Self {
        Self {
            request,
            concurrency: None,
            responses: None,
            failed: false,
            main: ResponseExpectation::default(),
            other: None,
        }
    }

    /// Full check over every collected response.
    fn settle(self, service: &str) -> Result<()> {
        match self.responses {
            None => Err(Error::InvalidStep(format!(
                "request {} {} for {service} was declared but never sent",
                self.request.method, self.request.url
            ))),
            Some(_) if self.failed => Ok(()),
            Some(responses) => {
                verify_outcomes(service, &responses, &self.main, self.other.as_ref()).map(|_| ())
            }
        }
    }
}

// ─── Scenario ─────────────────────────────────────────────────────────────────

pub struct Scenario {
    config: Arc<SuiteConfig>,
    suite_services: ServiceRegistry,
    services: ServiceRegistry,
    http: Option<Arc<dyn Transport>>,
    dispatcher: Arc<Dispatcher>,
    vars: VarContext,
    requests: BTreeMap<String, RequestState>,
    /// Mock expectation being declared, with its repeat count.
    draft: Option<(Expectation, usize)>,
    finished: bool,
}

impl Scenario {
    pub(crate) fn new(
        config: Arc<SuiteConfig>,
        services: ServiceRegistry,
        http: Option<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            config,
            suite_services: services.clone(),
            services,
            http,
            dispatcher: Arc::new(Dispatcher::new()),
            vars: VarContext::new(),
            requests: BTreeMap::new(),
            draft: None,
            finished: false,
        }
    }

    /// Mock side of the scenario, for servers that forward requests into it.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn vars(&self) -> &VarContext {
        &self.vars
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Drops every expectation, capture, request and service added so far.
    pub fn reset(&mut self) {
        self.dispatcher.reset();
        self.vars = VarContext::new();
        self.requests.clear();
        self.draft = None;
        self.services = self.suite_services.clone();
        self.finished = false;
    }

    pub async fn run_step(&mut self, text: &str, argument: Option<&StepArgument>) -> Result<()> {
        let (def, args) = table::match_step(text)?;
        let args = args.resolve(&self.vars)?;
        let call = def.build(&args)?;

        if !call.continues_mock() {
            self.flush_draft();
        }
        tracing::debug!(step = text, "running step");

        self.apply(call, argument).await
    }

    /// Runs steps until one fails, then always finishes the scenario.
    /// Every collected failure is returned.
    pub async fn run<I, S>(mut self, steps: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Option<StepArgument>)>,
        S: AsRef<str>,
    {
        let mut errors = Vec::new();
        for (text, argument) in steps {
            if let Err(err) = self.run_step(text.as_ref(), argument.as_ref()).await {
                tracing::error!(step = text.as_ref(), error = %err, "step failed");
                errors.push(err);
                break;
            }
        }

        if let Err(err) = self.finish() {
            errors.extend(err.into_list());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Scenario(errors))
        }
    }

    /// Verifies outstanding responses, recorded dispatch failures and the
    /// drain of every expectation queue.
    pub fn finish(mut self) -> Result<()> {
        self.finish_inner()
    }

    fn finish_inner(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.flush_draft();

        let mut errors = Vec::new();
        for (service, state) in std::mem::take(&mut self.requests) {
            if let Err(err) = state.settle(&service) {
                errors.push(err);
            }
        }
        if let Err(err) = self.dispatcher.finish() {
            errors.extend(err.into_list());
        }

        if errors.is_empty() {
            tracing::info!(captures = self.vars.len(), "scenario finished");
            return Ok(());
        }

        for err in &errors {
            tracing::error!(error = %err, "scenario failure");
        }
        Err(Error::Scenario(errors))
    }

    async fn apply(&mut self, call: StepCall, argument: Option<&StepArgument>) -> Result<()> {
        match call {
            StepCall::Request {
                service,
                method,
                uri,
            } => self.start_request(service, method, &uri),
            StepCall::RequestBody { service } => {
                let body = self.vars.resolve_json(document(argument)?)?;
                self.pending_request(&service)?.request.body = Some(normalize_body(Bytes::from(body)));
                Ok(())
            }
            StepCall::RequestBodyFile { service, path } => {
                let body = self.vars.resolve_json(&read_file(&path)?)?;
                self.pending_request(&service)?.request.body = Some(normalize_body(Bytes::from(body)));
                Ok(())
            }
            StepCall::RequestHeader {
                service,
                name,
                value,
            } => {
                self.pending_request(&service)?.request.set_header(&name, &value);
                Ok(())
            }
            StepCall::RequestCookie {
                service,
                name,
                value,
            } => {
                self.pending_request(&service)?.request.cookies.insert(name, value);
                Ok(())
            }
            StepCall::Concurrently { service, times } => {
                let level = times.unwrap_or(self.config.concurrency_level);
                self.pending_request(&service)?.concurrency = Some(level);
                Ok(())
            }
            StepCall::ResponseStatus {
                service,
                other,
                status,
            } => {
                self.assert_response(&service, other, |exp| exp.status = Some(status))
                    .await
            }
            StepCall::ResponseHeader {
                service,
                other,
                name,
                value,
            } => {
                self.assert_response(&service, other, |exp| exp.headers.push((name, value)))
                    .await
            }
            StepCall::ResponseBody { service, other } => {
                let body = self.vars.resolve_json(document(argument)?)?;
                self.assert_response(&service, other, |exp| exp.body = Some(BodySpec::new(body)))
                    .await
            }
            StepCall::ResponseBodyFile {
                service,
                other,
                path,
            } => {
                let body = self.vars.resolve_json(&read_file(&path)?)?;
                self.assert_response(&service, other, |exp| exp.body = Some(BodySpec::new(body)))
                    .await
            }
            StepCall::ResponseJsonPaths { service } => {
                let rows = argument
                    .and_then(StepArgument::rows)
                    .ok_or_else(|| Error::InvalidStep("step expects a table argument".to_string()))?;
                let mut paths = Vec::with_capacity(rows.len());
                for row in rows {
                    let [path, value] = row.as_slice() else {
                        return Err(Error::InvalidStep(format!(
                            "JSON path rows need a path and a value, got {row:?}"
                        )));
                    };
                    if path.eq_ignore_ascii_case("path") {
                        continue;
                    }
                    paths.push((self.vars.resolve(path)?, cell_value(&self.vars.resolve(value)?)));
                }
                self.assert_response(&service, false, |exp| exp.json_paths.extend(paths))
                    .await
            }
            StepCall::Capture {
                service,
                field,
                name,
            } => {
                let response = self.last_response(&service).await?;
                self.vars
                    .capture(&name, &response, &CaptureSource::parse(&field))
                    .map(|_| ())
            }
            StepCall::RegisterExpectation {
                service,
                method,
                path,
                status,
                with_body,
            } => {
                let mut expectation = Expectation::new(method, path)
                    .on_service(service)
                    .with_status(status);
                if with_body {
                    let body = self.vars.resolve_json(document(argument)?)?;
                    let body = normalize_body(Bytes::from(body));
                    if serde_json::from_slice::<serde_json::Value>(&body).is_ok() {
                        expectation = expectation.with_response_header("Content-Type", "application/json");
                    }
                    expectation = expectation.with_response_body(body);
                }
                self.dispatcher.expect(expectation);
                Ok(())
            }
            StepCall::MockReceives {
                service,
                method,
                uri,
            } => {
                self.draft = Some((Expectation::new(method, uri).on_service(service), 1));
                Ok(())
            }
            StepCall::MockRequestHeader {
                service,
                name,
                value,
            } => {
                self.draft(&service)?.request_headers.insert(name, value);
                Ok(())
            }
            StepCall::MockRequestCookie {
                service,
                name,
                value,
            } => {
                self.draft(&service)?.request_cookies.insert(name, value);
                Ok(())
            }
            StepCall::MockRequestBody { service } => {
                let body = self.vars.resolve_json(document(argument)?)?;
                self.draft(&service)?.request_body = Some(BodySpec::new(body));
                Ok(())
            }
            StepCall::MockTimes { service, times } => match self.draft.as_mut() {
                Some((expectation, count)) if expectation.service == service => {
                    *count = times;
                    Ok(())
                }
                _ => Err(missing_draft(&service)),
            },
            StepCall::MockResponseHeader {
                service,
                name,
                value,
            } => {
                self.draft(&service)?.response_headers.insert(name, value);
                Ok(())
            }
            StepCall::MockResponseStatus {
                service,
                status,
                with_body,
            } => {
                let body = if with_body {
                    Some(self.vars.resolve_json(document(argument)?)?)
                } else {
                    None
                };
                let draft = self.draft(&service)?;
                draft.status = status;
                if let Some(body) = body {
                    draft.response_body = normalize_body(Bytes::from(body));
                }
                Ok(())
            }
            StepCall::ServiceAvailable { name, url } => {
                tracing::info!(service = %name, url = %url, "service added for scenario");
                self.services = std::mem::take(&mut self.services).with_service(&name, &url);
                Ok(())
            }
        }
    }

    // ─── Client helpers ──────────────────────────────────────────────────────

    fn start_request(&mut self, service: String, method: HttpMethod, uri: &str) -> Result<()> {
        if let Some(previous) = self.requests.remove(&service) {
            previous.settle(&service)?;
        }

        let mut request = OutboundRequest::new(method, self.url_for(&service, uri)?);
        for (name, value) in &self.config.headers {
            request.set_header(name, value);
        }
        self.requests.insert(service, RequestState::new(request));
        Ok(())
    }

    fn url_for(&self, service: &str, uri: &str) -> Result<String> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(uri.to_string());
        }
        let base = self
            .services
            .url(service)
            .ok_or_else(|| Error::InvalidStep(format!("unknown service `{service}`")))?;

        if uri.is_empty() || uri.starts_with(['/', '?']) {
            Ok(format!("{base}{uri}"))
        } else {
            Ok(format!("{base}/{uri}"))
        }
    }

    /// Request that is declared and not yet sent.
    fn pending_request(&mut self, service: &str) -> Result<&mut RequestState> {
        let state = self.requests.get_mut(service).ok_or_else(|| {
            Error::InvalidStep(format!("no request declared for {service}"))
        })?;
        if state.responses.is_some() {
            return Err(Error::InvalidStep(format!(
                "request for {service} was already sent"
            )));
        }
        Ok(state)
    }

    fn transport(&self) -> Arc<dyn Transport> {
        match &self.http {
            Some(http) => http.clone(),
            None => Arc::new(LocalTransport::new(
                self.dispatcher.clone(),
                self.services.clone(),
            )),
        }
    }

    async fn ensure_sent(&mut self, service: &str) -> Result<()> {
        let transport = self.transport();
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let state = self.requests.get_mut(service).ok_or_else(|| {
            Error::InvalidStep(format!("no request declared for {service}"))
        })?;
        if state.responses.is_some() {
            return Ok(());
        }

        let (responses, errors) = match state.concurrency {
            Some(level) => {
                let report = probe_idempotent(
                    transport,
                    state.request.clone(),
                    ConcurrencyPlan::new(level, timeout),
                )
                .await;
                (report.responses(), report.errors())
            }
            None => {
                let url = state.request.url.clone();
                let result = tokio::time::timeout(timeout, transport.send(state.request.clone()))
                    .await
                    .unwrap_or_else(|_| {
                        Err(Error::Transport(format!(
                            "request {url} exceeded deadline of {} ms",
                            timeout.as_millis()
                        )))
                    });
                match result {
                    Ok(response) => (vec![response], Vec::new()),
                    Err(err) => (Vec::new(), vec![err]),
                }
            }
        };

        state.responses = Some(responses);
        let mut errors = errors;
        match errors.len() {
            0 => Ok(()),
            1 => {
                state.failed = true;
                Err(errors.remove(0))
            }
            _ => {
                state.failed = true;
                Err(Error::Scenario(errors))
            }
        }
    }

    async fn assert_response<F>(&mut self, service: &str, other: bool, declare: F) -> Result<()>
    where
        F: FnOnce(&mut ResponseExpectation),
    {
        self.ensure_sent(service).await?;
        let state = self.requests.get_mut(service).ok_or_else(|| {
            Error::InvalidStep(format!("no request declared for {service}"))
        })?;
        let responses = state.responses.as_deref().unwrap_or_default();

        let checked = if other {
            declare(state.other.get_or_insert_with(ResponseExpectation::default));
            verify_outcomes(service, responses, &state.main, state.other.as_ref())
        } else {
            declare(&mut state.main);
            find_matching(service, responses, &state.main)
        };
        if checked.is_err() {
            state.failed = true;
        }
        checked.map(|_| ())
    }

    /// Response matching the main assertions, or the first one received.
    async fn last_response(&mut self, service: &str) -> Result<HttpResponse> {
        self.ensure_sent(service).await?;
        let state = self.requests.get(service).ok_or_else(|| {
            Error::InvalidStep(format!("no request declared for {service}"))
        })?;
        let responses = state.responses.as_deref().unwrap_or_default();
        let idx = find_matching(service, responses, &state.main).unwrap_or(0);
        responses.get(idx).cloned().ok_or_else(|| {
            Error::ResponseMismatch(format!("no response received for {service}"))
        })
    }

    // ─── Mock helpers ────────────────────────────────────────────────────────

    fn draft(&mut self, service: &str) -> Result<&mut Expectation> {
        match self.draft.as_mut() {
            Some((expectation, _)) if expectation.service == service => Ok(expectation),
            _ => Err(missing_draft(service)),
        }
    }

    fn flush_draft(&mut self) {
        if let Some((expectation, times)) = self.draft.take() {
            for _ in 0..times {
                self.dispatcher.expect(expectation.clone());
            }
        }
    }
}

impl Drop for Scenario {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.finish_inner() {
                tracing::error!(error = %err, "scenario dropped without finishing");
            }
        }
    }
}

fn missing_draft(service: &str) -> Error {
    Error::InvalidStep(format!(
        "no mock request declared for {service}, start with \"{service}\" receives"
    ))
}

fn document(argument: Option<&StepArgument>) -> Result<&str> {
    argument
        .and_then(StepArgument::text)
        .ok_or_else(|| Error::InvalidStep("step expects a document argument".to_string()))
}

fn read_file(path: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|err| Error::InvalidStep(format!("failed to read {path}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::LocalClient;

    fn client(config: SuiteConfig) -> LocalClient {
        LocalClient::new(config).unwrap()
    }

    fn doc(text: &str) -> Option<StepArgument> {
        Some(StepArgument::from(text))
    }

    #[tokio::test]
    async fn get_then_assert_status_header_and_body() {
        let mut scenario = client(SuiteConfig::new("http://localhost")).begin_scenario();

        scenario
            .run_step(
                r#"I register an expectation for method "GET" at path "/get-something?foo=bar" returning status "200" with body"#,
                doc(r#"[{"some":"json"}]"#).as_ref(),
            )
            .await
            .unwrap();
        scenario
            .run_step(r#"I request HTTP endpoint with method "GET" and URI "/get-something?foo=bar""#, None)
            .await
            .unwrap();
        scenario.run_step(r#"I should have response with status "OK""#, None).await.unwrap();
        scenario
            .run_step(
                r#"I should have response with header "Content-Type" and value "application/json""#,
                None,
            )
            .await
            .unwrap();
        scenario
            .run_step("I should have response with body", doc("[ {\"some\": \"json\"} ]").as_ref())
            .await
            .unwrap();

        assert!(scenario.finish().is_ok());
    }

    #[tokio::test]
    async fn capture_from_status_header_and_body() {
        let mut scenario = client(SuiteConfig::new("http://localhost")).begin_scenario();
        let steps = [
            (r#""default" receives "GET" request "/user""#, None),
            (r#""default" responds with header "X-Request-Id" and value "r-1""#, None),
            (r#""default" responds with status "200" and body"#, doc(r#"{"id":12345,"name":"John Doe"}"#)),
            (r#"I request HTTP endpoint with method "GET" and URI "/user""#, None),
            (r#"I capture field "$.id" from the last response as "user_id""#, None),
            (r#"I capture field "status" from the last response as "code""#, None),
            (r#"I capture field "header X-Request-Id" from the last response as "rid""#, None),
        ];
        for (text, argument) in &steps {
            scenario.run_step(text, argument.as_ref()).await.unwrap();
        }

        assert_eq!(scenario.vars().resolve("{{user_id}}/{{code}}/{{rid}}").unwrap(), "12345/200/r-1");
        let err = scenario
            .run_step(r#"I capture field "$.missing" from the last response as "x""#, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CaptureNotFound { .. }));
        assert!(scenario.finish().is_ok());
    }

    #[tokio::test]
    async fn typed_body_substitution_matches_mock_constraint() {
        let scenario = client(SuiteConfig::new("http://localhost")).begin_scenario();
        let result = scenario
            .run(vec![
                (r#""default" receives "GET" request "/user""#, None),
                (r#""default" responds with status "200" and body"#, doc(r#"{"id":12345}"#)),
                (r#"I request HTTP endpoint with method "GET" and URI "/user""#, None),
                (r#"I capture field "id" from the last response as "user_id""#, None),
                (r#""default" receives "POST" request "/order""#, None),
                (r#""default" request is received with body"#, doc(r#"{"user_id":12345,"item_name":"Watermelon"}"#)),
                (r#""default" responds with status "201""#, None),
                (r#"I request HTTP endpoint with method "POST" and URI "/order""#, None),
                ("I request HTTP endpoint with body", doc(r#"{"user_id":"{{user_id}}","item_name":"Watermelon"}"#)),
                (r#"I should have response with status "Created""#, None),
            ])
            .await;
        assert!(result.is_ok(), "{result:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn probe_without_other_responses_fails_at_finish() {
        let scenario =
            client(SuiteConfig::new("http://localhost").with_concurrency_level(5)).begin_scenario();
        let err = scenario
            .run(vec![
                (r#""default" receives "DELETE" request "/delete-something""#, None),
                (r#""default" responds with status "204""#, None),
                (r#""default" receives "DELETE" request "/delete-something""#, None),
                (r#""default" request is received 4 times"#, None),
                (r#""default" responds with status "404" and body"#, doc(r#"{"status":"failed"}"#)),
                (r#"I request HTTP endpoint with method "DELETE" and URI "/delete-something""#, None),
                ("I concurrently request idempotent HTTP endpoint", None),
                (r#"I should have response with status "No Content""#, None),
            ])
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "no other responses expected for default: unexpected response status, \
             expected: 204 (No Content), received: 404 (Not Found)"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn probe_with_other_responses_passes() {
        let scenario =
            client(SuiteConfig::new("http://localhost").with_concurrency_level(5)).begin_scenario();
        let result = scenario
            .run(vec![
                (r#""default" receives "DELETE" request "/delete-something""#, None),
                (r#""default" responds with status "204""#, None),
                (r#""default" receives "DELETE" request "/delete-something""#, None),
                (r#""default" request is received 4 times"#, None),
                (r#""default" responds with status "404" and body"#, doc(r#"{"status":"failed"}"#)),
                (r#"I request HTTP endpoint with method "DELETE" and URI "/delete-something""#, None),
                ("I concurrently request idempotent HTTP endpoint", None),
                (r#"I should have response with status "No Content""#, None),
                (r#"I should have other responses with status "Not Found""#, None),
                ("I should have other responses with body", doc(r#"{"status":"failed"}"#)),
            ])
            .await;
        assert!(result.is_ok(), "{result:?}");
    }

    #[tokio::test]
    async fn run_finishes_after_a_failed_step() {
        let scenario = client(SuiteConfig::new("http://localhost")).begin_scenario();
        let err = scenario
            .run(vec![
                (r#"I register an expectation for method "GET" at path "/never" returning status "200""#, None),
                ("I do something unknown", None),
                (r#"I request HTTP endpoint with method "GET" and URI "/never""#, None),
            ])
            .await
            .unwrap_err();

        let errors = err.into_list();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], Error::InvalidStep(_)));
        assert!(matches!(errors[1], Error::PendingExpectations(_)));
    }

    #[tokio::test]
    async fn scenarios_do_not_share_captures() {
        let client = client(SuiteConfig::new("http://localhost"));

        let mut first = client.begin_scenario();
        first.vars.set("id", crate::domain::CapturedValue::Number(1.into()));
        assert!(first.finish().is_ok());

        let mut second = client.begin_scenario();
        let err = second
            .run_step(r#"I request HTTP endpoint with method "GET" and URI "/x/{{id}}""#, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedPlaceholder(name) if name == "id"));
        assert!(second.finish().is_ok());
    }

    #[tokio::test]
    async fn scenario_local_service_routes_requests() {
        let client = client(SuiteConfig::new("http://localhost"));
        let mut scenario = client.begin_scenario();
        scenario
            .run_step(r#"service "billing" is available at "http://billing.local""#, None)
            .await
            .unwrap();
        scenario
            .run_step(r#""billing" receives "GET" request "/invoices""#, None)
            .await
            .unwrap();
        scenario
            .run_step(r#""billing" responds with status "200" and body"#, doc("a,b,c").as_ref())
            .await
            .unwrap();
        scenario
            .run_step(r#"I request "billing" HTTP endpoint with method "GET" and URI "/invoices""#, None)
            .await
            .unwrap();
        scenario
            .run_step(r#"I should have "billing" response with body"#, doc("a,b,c").as_ref())
            .await
            .unwrap();
        assert!(scenario.finish().is_ok());

        assert_eq!(client.begin_scenario().services().url("billing"), None);
    }

    #[tokio::test]
    async fn unsent_request_is_reported() {
        let mut scenario = client(SuiteConfig::new("http://localhost")).begin_scenario();
        scenario
            .run_step(r#"I request HTTP endpoint with method "GET" and URI "/lonely""#, None)
            .await
            .unwrap();
        let err = scenario.finish().unwrap_err();
        assert!(err.to_string().contains("was declared but never sent"));
    }

    struct StalledTransport;

    impl Transport for StalledTransport {
        fn send(&self, _request: OutboundRequest) -> crate::http::client::TransportFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(Error::Transport("unreachable".to_string()))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_call_past_deadline_is_a_transport_error() {
        let config = SuiteConfig::new("http://localhost").with_timeout_ms(250);
        let services = config.service_registry();
        let mut scenario = Scenario::new(Arc::new(config), services, Some(Arc::new(StalledTransport)));

        scenario
            .run_step(r#"I request HTTP endpoint with method "GET" and URI "/slow""#, None)
            .await
            .unwrap();
        let err = scenario
            .run_step(r#"I should have response with status "OK""#, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(
            err.to_string(),
            "transport error: request http://localhost/slow exceeded deadline of 250 ms"
        );
        assert!(scenario.finish().is_ok());
    }

    #[tokio::test]
    async fn reset_clears_scenario_state() {
        let mut scenario = client(SuiteConfig::new("http://localhost")).begin_scenario();
        scenario
            .run_step(r#"I register an expectation for method "GET" at path "/x" returning status "200""#, None)
            .await
            .unwrap();
        scenario.reset();
        assert_eq!(scenario.dispatcher().store().pending_count(), 0);
        assert!(scenario.finish().is_ok());
    }
}
