use crate::violation::ViolationPolicy;

/// Default OS thread name given to traced worker threads.
pub const DEFAULT_THREAD_NAME: &str = "lzma-native";

/// Settings of a trace session.
///
/// # Examples
///
/// ```
/// use synctrace::{TraceConfig, ViolationPolicy};
///
/// let config = TraceConfig::default()
///     .with_violation_policy(ViolationPolicy::Panic)
///     .with_thread_name("codec-worker");
/// assert_eq!(config.thread_name(), "codec-worker");
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceConfig {
    violation_policy: ViolationPolicy,
    thread_name: String,
}

impl TraceConfig {
    /// Sets what happens after a protocol violation.
    #[must_use]
    pub const fn with_violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.violation_policy = policy;
        self
    }

    /// Sets the OS thread name used when a spawn does not supply one.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Violation policy.
    #[must_use]
    pub const fn violation_policy(&self) -> ViolationPolicy {
        self.violation_policy
    }

    /// Default worker thread name.
    #[must_use]
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            violation_policy: ViolationPolicy::default(),
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}
