//! Declarative HTTP contract steps.
//!
//! Scenarios register the requests a service is expected to receive, issue
//! requests (optionally as concurrent idempotency probes), assert on the
//! responses and carry captured values from one step to the next. Every
//! scenario finishes with a drain check over its expectations.

pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod http;
pub mod steps;

pub use config::{ConfigError, SuiteConfig, TransportMode};
pub use error::{Error, Result};
pub use steps::{LocalClient, Scenario, StepArgument};
