//! crates/logging/src/init.rs
//! Installation of the global `tracing` subscriber.

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use super::config::LogConfig;

/// Failure to install the subscriber.
#[derive(Debug, Error)]
pub enum LogError {
    /// The explicit filter expression does not parse.
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    /// A global subscriber is already installed.
    #[error("tracing subscriber already initialised: {0}")]
    AlreadyInitialised(#[from] TryInitError),
}

/// Installs a formatting subscriber on stderr filtered per `config`.
///
/// # Errors
///
/// See [`LogError`].
pub fn init_tracing(config: &LogConfig) -> Result<(), LogError> {
    let filter = config.env_filter()?;
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(config.thread_names());
    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;
    tracing::debug!(target: "logging", directive = config.directive(), "tracing initialised");
    Ok(())
}

/// Installs a subscriber that writes through the test harness's capture.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let filter = LogConfig::from_verbose_count(2)
        .env_filter()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_thread_names(true),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_installation_is_an_error() {
        init_test_tracing();
        init_test_tracing();
        let error = init_tracing(&LogConfig::default()).expect_err("already installed");
        assert!(matches!(error, LogError::AlreadyInitialised(_)));
    }

    #[test]
    fn bad_filter_fails_before_installing() {
        let error = init_tracing(&LogConfig::default().with_filter("=[")).expect_err("bad filter");
        assert!(matches!(error, LogError::Filter(_)));
    }
}
