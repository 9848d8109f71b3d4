use std::sync::Arc;
use std::time::Duration;

use crate::config::{SuiteConfig, TransportMode};
use crate::domain::ServiceRegistry;
use crate::error::Result;
use crate::http::client::{HttpTransport, Transport};

use super::scenario::Scenario;
use super::table;

/// Suite-level entry point: holds the read-only configuration and hands out
/// an isolated [`Scenario`] for every scenario the runner executes.
pub struct LocalClient {
    config: Arc<SuiteConfig>,
    services: ServiceRegistry,
    http: Option<Arc<dyn Transport>>,
}

impl LocalClient {
    pub fn new(config: SuiteConfig) -> Result<Self> {
        config.validate()?;

        let http: Option<Arc<dyn Transport>> = match config.transport {
            TransportMode::Http => Some(Arc::new(HttpTransport::new(Duration::from_millis(
                config.timeout_ms,
            ))?)),
            TransportMode::Loopback => None,
        };

        tracing::info!(
            base_url = %config.base_url,
            services = config.services.len(),
            concurrency = config.concurrency_level,
            transport = ?config.transport,
            "local client ready"
        );

        Ok(Self {
            services: config.service_registry(),
            config: Arc::new(config),
            http,
        })
    }

    /// Builds a client from `HTTPSTEPS_CONFIG` and environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::new(SuiteConfig::load()?)
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Starts a scenario with an empty expectation store and capture context.
    pub fn begin_scenario(&self) -> Scenario {
        Scenario::new(self.config.clone(), self.services.clone(), self.http.clone())
    }

    /// Step patterns understood by [`Scenario::run_step`].
    pub fn step_patterns() -> Result<Vec<&'static str>> {
        table::step_patterns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn rejects_invalid_config() {
        let config = SuiteConfig::new("http://localhost").with_timeout_ms(0);
        assert!(matches!(LocalClient::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn exposes_suite_registry() {
        let client = LocalClient::new(
            SuiteConfig::new("http://localhost:8080").with_service("some-service", "http://svc"),
        )
        .unwrap();
        assert_eq!(client.services().url("some-service"), Some("http://svc"));
        assert!(!LocalClient::step_patterns().unwrap().is_empty());
    }
}
