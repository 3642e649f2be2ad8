//! crates/logging/src/verbosity.rs
//! Verbosity levels selected by repeated `-v` flags.

use tracing_subscriber::filter::LevelFilter;

/// Default level of diagnostics when no explicit filter is given.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Verbosity {
    /// Warnings and errors only.
    #[default]
    Quiet,
    /// Adds informational events such as acknowledged records.
    Info,
    /// Adds per-operation debug events.
    Debug,
    /// Everything, including hot-path trace events.
    Trace,
}

impl Verbosity {
    /// Maps a `-v` count to a level; counts past three saturate.
    #[must_use]
    pub const fn from_count(count: u8) -> Self {
        match count {
            0 => Self::Quiet,
            1 => Self::Info,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// The matching `tracing` level filter.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    /// Filter directive text for this level.
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_saturate_at_trace() {
        assert_eq!(Verbosity::from_count(0), Verbosity::Quiet);
        assert_eq!(Verbosity::from_count(1), Verbosity::Info);
        assert_eq!(Verbosity::from_count(2), Verbosity::Debug);
        assert_eq!(Verbosity::from_count(3), Verbosity::Trace);
        assert_eq!(Verbosity::from_count(200), Verbosity::Trace);
    }

    #[test]
    fn levels_grow_with_verbosity() {
        assert!(Verbosity::Quiet.level_filter() < Verbosity::Info.level_filter());
        assert_eq!(Verbosity::Debug.level_filter(), LevelFilter::DEBUG);
        assert_eq!(Verbosity::Trace.directive(), "trace");
    }
}
