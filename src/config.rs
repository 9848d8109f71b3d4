//! Suite configuration.
//!
//! Supports a YAML file and environment variable overrides. The configuration
//! is read once at suite setup and shared read-only by every scenario.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{DEFAULT_SERVICE, ServiceRegistry};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// How outbound calls issued by scenario steps reach their target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Real HTTP over reqwest.
    Http,
    /// In-process delivery to the scenario's own expectation store.
    #[default]
    Loopback,
}

/// Suite-wide knobs: service URLs, fixed headers and probe fan-out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Base URL of the `default` service.
    pub base_url: String,
    /// Headers added to every outbound call.
    pub headers: BTreeMap<String, String>,
    /// Number of concurrent calls an idempotency probe issues.
    pub concurrency_level: usize,
    /// Named services and their base URLs.
    pub services: BTreeMap<String, String>,
    /// Per-call deadline, also used as the probe deadline.
    pub timeout_ms: u64,
    pub transport: TransportMode,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            headers: BTreeMap::new(),
            concurrency_level: 1,
            services: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            transport: TransportMode::default(),
        }
    }
}

impl SuiteConfig {
    /// Creates a configuration whose default service lives at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_concurrency_level(mut self, level: usize) -> Self {
        self.concurrency_level = level;
        self
    }

    pub fn with_service(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.services.insert(name.into(), url.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (`HTTPSTEPS_CONFIG`, default `httpsteps.yaml`)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("HTTPSTEPS_CONFIG").unwrap_or_else(|_| "httpsteps.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HTTPSTEPS_BASE_URL") {
            self.base_url = url;
        }

        if let Ok(level) = std::env::var("HTTPSTEPS_CONCURRENCY") {
            if let Ok(level) = level.parse() {
                self.concurrency_level = level;
            }
        }

        if let Ok(timeout) = std::env::var("HTTPSTEPS_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse() {
                self.timeout_ms = timeout;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if let Some(name) = self.services.keys().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "service name `{name}` must not be empty"
            )));
        }
        Ok(())
    }

    /// Builds the immutable service registry, `default` included.
    pub fn service_registry(&self) -> ServiceRegistry {
        let mut registry = ServiceRegistry::new(&self.base_url);
        for (name, url) in &self.services {
            if name != DEFAULT_SERVICE {
                registry = registry.with_service(name, url);
            }
        }
        registry
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
