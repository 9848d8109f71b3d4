use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::{MockRequest, ServiceRegistry};
use crate::engine::dispatch::Dispatcher;
use crate::error::{Error, Result};

use super::request::OutboundRequest;
use super::response::HttpResponse;

pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>>;

/// Request/response exchange used by scenario steps and probes.
pub trait Transport: Send + Sync {
    fn send(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

pub fn build_headers(input: &[(String, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| Error::Transport(format!("Invalid header name `{key}`: {err}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|err| Error::Transport(format!("Invalid header value for `{key}`: {err}")))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

/// Sends requests over the network with reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Transport(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self { client })
    }

    async fn send_impl(&self, request: OutboundRequest) -> Result<HttpResponse> {
        let method: Method = request.method.into();
        let mut headers = build_headers(&request.headers)?;
        if let Some(cookie) = request.cookie_header() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|err| Error::Transport(format!("Invalid cookie value: {err}")))?;
            headers.insert(COOKIE, value);
        }

        let mut builder = self.client.request(method, &request.url).headers(headers);
        if let Some(body) = request.body.filter(|_| request.method.carries_body()) {
            builder = builder.body(body);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|err| Error::Transport(format!("Request failed: {err}")))?;

        let status = response.status().as_u16();
        let response_headers = response
            .headers()
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|err| Error::Transport(format!("Failed to read response: {err}")))?;

        Ok(HttpResponse {
            status,
            headers: response_headers,
            body,
            duration_ms: started.elapsed().as_millis(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
        Box::pin(self.send_impl(request))
    }
}

// ─── Loopback ─────────────────────────────────────────────────────────────────

/// Delivers requests straight to a dispatcher, resolving the target service
/// from the request URL.
pub struct LocalTransport {
    dispatcher: Arc<Dispatcher>,
    services: ServiceRegistry,
}

impl LocalTransport {
    pub fn new(dispatcher: Arc<Dispatcher>, services: ServiceRegistry) -> Self {
        Self {
            dispatcher,
            services,
        }
    }

    async fn send_impl(&self, request: OutboundRequest) -> Result<HttpResponse> {
        let (service, rest) = self.services.resolve_url(&request.url).ok_or_else(|| {
            Error::Transport(format!("no service registered for {}", request.url))
        })?;

        let uri = match rest {
            "" => "/".to_string(),
            rest if rest.starts_with('/') => rest.to_string(),
            rest => format!("/{rest}"),
        };

        let mut headers = request.headers.clone();
        if let Some(cookie) = request.cookie_header() {
            headers.push(("Cookie".to_string(), cookie));
        }

        let mock_request = MockRequest {
            service: service.to_string(),
            method: request.method.to_string(),
            uri,
            headers,
            cookies: request.cookies,
            body: request.body.unwrap_or_default(),
        };

        let started = Instant::now();
        // Concurrent probe calls reach the store in scheduler order.
        tokio::task::yield_now().await;
        let response = self.dispatcher.dispatch(mock_request);

        Ok(HttpResponse {
            status: response.status,
            headers: response.headers.into_iter().collect(),
            body: response.body,
            duration_ms: started.elapsed().as_millis(),
        })
    }
}

impl Transport for LocalTransport {
    fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
        Box::pin(self.send_impl(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Expectation;
    use crate::http::method::HttpMethod;

    #[test]
    fn build_headers_rejects_bad_names() {
        let headers = vec![("Bad Header".to_string(), "x".to_string())];
        assert!(build_headers(&headers).is_err());

        let headers = vec![
            ("X-Foo".to_string(), "bar".to_string()),
            (String::new(), "skipped".to_string()),
        ];
        let map = build_headers(&headers).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("x-foo").unwrap(), "bar");
    }

    #[tokio::test]
    async fn local_transport_routes_by_service_url() {
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.expect(
            Expectation::new(HttpMethod::Get, "/things?a=1&b=2")
                .on_service("things")
                .with_request_cookie("c1", "v1")
                .with_response_body("[]"),
        );

        let services = ServiceRegistry::new("http://local").with_service("things", "http://things");
        let transport = LocalTransport::new(dispatcher.clone(), services);

        let mut request = OutboundRequest::new(HttpMethod::Get, "http://things/things?b=2&a=1");
        request.cookies.insert("c1".to_string(), "v1".to_string());
        let response = transport.send(request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body_text(), "[]");
        assert!(dispatcher.finish().is_ok());
    }

    #[tokio::test]
    async fn local_transport_rejects_unknown_urls() {
        let dispatcher = Arc::new(Dispatcher::new());
        let transport = LocalTransport::new(dispatcher, ServiceRegistry::new("http://local"));

        let err = transport
            .send(OutboundRequest::new(HttpMethod::Get, "http://remote/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
