use thiserror::Error;
use trace_io::ChannelError;
use trace_protocol::{Ack, RecordError};

use crate::context::ContextState;

const TARGET: &str = "synctrace::session";

/// What happens after a protocol violation has been logged.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ViolationPolicy {
    /// Abort the process immediately.
    #[default]
    Abort,
    /// Panic the offending thread with the violation message.
    ///
    /// Intended for tests, where `#[should_panic]` can observe the violation.
    Panic,
}

/// Conditions after which the trace can no longer be trusted.
///
/// None of these is ever returned to a caller; they are handed to [`fatal`].
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    /// A channel operation failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// A record could not be built or decoded.
    #[error(transparent)]
    Record(#[from] RecordError),
    /// The observer acknowledged something other than the record just sent.
    #[error("acknowledgment mismatch: expected {expected:?}, got {actual:?}")]
    AckMismatch {
        /// Acknowledgment the context waited for.
        expected: Ack,
        /// Acknowledgment that arrived.
        actual: Ack,
    },
    /// A status report carried a value outside the accepted result codes.
    #[error("status '{label}' reported invalid code {code}")]
    InvalidStatus {
        /// Label of the status report.
        label: String,
        /// Offending value.
        code: u32,
    },
    /// A session already exists in this process.
    #[error("a trace session is already running")]
    SessionExists,
    /// A thread tried to attach while no session is running.
    #[error("no trace session is running")]
    NoSession,
    /// A thread identifier is attached twice.
    #[error("thread {0:#010x} is already attached")]
    AlreadyAttached(u32),
    /// A context was used outside the `Attached` state.
    #[error("thread {thread:#010x} cannot {operation} while {state:?}")]
    InvalidState {
        /// Thread owning the context.
        thread: u32,
        /// Current state of the context.
        state: ContextState,
        /// Attempted operation.
        operation: &'static str,
    },
    /// Fewer than one or more than three match arguments were supplied.
    #[error("match records take one to three arguments, got {0}")]
    MatchArity(usize),
}

/// Logs `violation` and never returns.
///
/// With [`ViolationPolicy::Abort`] the process is aborted; with
/// [`ViolationPolicy::Panic`] the calling thread panics.
#[cold]
pub fn fatal(policy: ViolationPolicy, violation: impl Into<ProtocolViolation>) -> ! {
    let violation = violation.into();
    tracing::error!(target: TARGET, policy = ?policy, "trace protocol violation: {violation}");
    match policy {
        ViolationPolicy::Abort => std::process::abort(),
        ViolationPolicy::Panic => panic!("trace protocol violation: {violation}"),
    }
}
