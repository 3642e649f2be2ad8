#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` installs the process-wide `tracing` subscriber used by the
//! `trace-observer` binary and by tests. Library crates only emit events
//! through the `tracing` macros with `target:` names such as
//! `synctrace::session` or `mtcoder::ring`; deciding which of those reach
//! the terminal happens here.
//!
//! # Design
//!
//! [`LogConfig`] carries a verbosity count (the number of `-v` flags) and an
//! optional explicit filter expression. [`LogConfig::env_filter`] resolves
//! them into an [`EnvFilter`](tracing_subscriber::EnvFilter): an explicit
//! expression wins, then `RUST_LOG`, then the level implied by the
//! verbosity count. [`init_tracing`] installs a formatting layer behind
//! that filter.
//!
//! # Errors
//!
//! [`LogError`] reports an unparsable filter expression or a subscriber
//! that was already installed.
//!
//! # Examples
//!
//! ```
//! use logging::{LogConfig, Verbosity};
//!
//! let config = LogConfig::from_verbose_count(2).with_filter("synctrace=trace");
//! assert_eq!(config.verbosity(), Verbosity::Debug);
//! assert_eq!(config.directive(), "synctrace=trace");
//! ```

mod config;
mod init;
mod verbosity;

pub use config::LogConfig;
pub use init::{LogError, init_test_tracing, init_tracing};
pub use verbosity::Verbosity;
