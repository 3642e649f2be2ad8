//! crates/logging/src/config.rs
//! Subscriber configuration: verbosity plus an optional filter expression.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

use super::verbosity::Verbosity;

/// How diagnostics are filtered and formatted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogConfig {
    verbosity: Verbosity,
    filter: Option<String>,
    thread_names: bool,
}

impl LogConfig {
    /// Configuration for `count` repetitions of `-v`.
    #[must_use]
    pub const fn from_verbose_count(count: u8) -> Self {
        Self {
            verbosity: Verbosity::from_count(count),
            filter: None,
            thread_names: false,
        }
    }

    /// Uses `filter` (`EnvFilter` syntax) instead of the verbosity level.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Prefixes every line with the emitting thread's name.
    #[must_use]
    pub const fn with_thread_names(mut self, enabled: bool) -> Self {
        self.thread_names = enabled;
        self
    }

    /// Selected verbosity.
    #[must_use]
    pub const fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Explicit filter expression, if any.
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Whether thread names are printed.
    #[must_use]
    pub const fn thread_names(&self) -> bool {
        self.thread_names
    }

    /// The directive used when `RUST_LOG` is not consulted.
    #[must_use]
    pub fn directive(&self) -> &str {
        self.filter().unwrap_or(self.verbosity.directive())
    }

    /// Resolves the filter: explicit expression, then `RUST_LOG`, then the
    /// verbosity level.
    ///
    /// # Errors
    ///
    /// Returns the parse error of an invalid explicit expression.
    pub fn env_filter(&self) -> Result<EnvFilter, ParseError> {
        if let Some(filter) = &self.filter {
            return EnvFilter::try_new(filter);
        }
        Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.verbosity.directive())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_quiet_without_filter() {
        let config = LogConfig::default();
        assert_eq!(config.verbosity(), Verbosity::Quiet);
        assert_eq!(config.filter(), None);
        assert_eq!(config.directive(), "warn");
        assert!(!config.thread_names());
    }

    #[test]
    fn explicit_filter_takes_precedence() {
        let config = LogConfig::from_verbose_count(3).with_filter("mtcoder::ring=debug");
        assert_eq!(config.directive(), "mtcoder::ring=debug");
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn invalid_filter_is_reported() {
        let config = LogConfig::default().with_filter("synctrace=[");
        assert!(config.env_filter().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_round_trips_through_json() {
        let config = LogConfig::from_verbose_count(1).with_thread_names(true);
        let json = serde_json::to_string(&config).expect("serialize");
        let back: LogConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
