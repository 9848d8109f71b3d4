//! Tracing setup for suites built on this crate.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "HTTPSTEPS_LOG";

/// Initialize tracing with the HTTPSTEPS_LOG environment variable.
///
/// Defaults to "info" level if HTTPSTEPS_LOG is not set. Calling it more
/// than once is harmless; only the first subscriber is installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Filter from HTTPSTEPS_LOG, falling back to "info".
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_keeps_first_subscriber() {
        init_tracing();
        init_tracing();
        tracing::info!("still logging");
        assert!(!env_filter().to_string().is_empty());
    }
}
