//! Instrumented synchronisation primitives.
//!
//! Every wrapper runs the real primitive and brackets it with trace
//! records. Records for operations that release other threads (set,
//! release, leave) are written before the primitive runs; records for
//! operations that wait (wait, enter, join) are written after it returns.
//! Either way the observer never learns about an interleaving that did not
//! or could not happen.
//!
//! All wrappers take the calling thread's [`Tracer`](crate::Tracer). With a
//! disabled tracer they behave exactly like the plain primitive.

mod critical_section;
mod event;
mod semaphore;
mod thread;

use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;
use trace_protocol::StatusCode;

pub use self::critical_section::{CriticalSection, CriticalSectionGuard};
pub use self::event::AutoResetEvent;
pub use self::semaphore::Semaphore;
pub use self::thread::{ScopedTracedThread, TracedThread};

static NEXT_OBJECT: AtomicU32 = AtomicU32::new(1);

/// Process-unique handle of a traced object.
///
/// The observer keys object lifecycle records by this value. Identifiers
/// are never reused within a process and are never zero.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectId(NonZeroU32);

impl ObjectId {
    /// Allocates a fresh identifier.
    #[must_use]
    pub fn next() -> Self {
        loop {
            // zero only comes back after the counter wraps
            if let Some(id) = NonZeroU32::new(NEXT_OBJECT.fetch_add(1, Ordering::Relaxed)) {
                return Self(id);
            }
        }
    }

    /// Raw handle value as written on the wire.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Recoverable failure of an instrumented primitive.
///
/// The failure is also reported to the observer as a status record.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum SyncError {
    /// A semaphore was created with a zero maximum.
    #[error("semaphore maximum count must be non-zero")]
    ZeroMaximum,
    /// A semaphore was created with more permits than its maximum.
    #[error("initial count {initial} exceeds the maximum of {max}")]
    InitialCount {
        /// Requested initial count.
        initial: u32,
        /// Requested maximum.
        max: u32,
    },
    /// A release would raise the count past the maximum.
    #[error("releasing {count} permits would exceed the maximum of {max}")]
    Overflow {
        /// Permits being released.
        count: u32,
        /// Semaphore maximum.
        max: u32,
    },
}

impl SyncError {
    /// Status code reported for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        StatusCode::Param
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_unique_and_non_zero() {
        let first = ObjectId::next();
        let second = ObjectId::next();
        assert_ne!(first, second);
        assert_ne!(first.get(), 0);
        assert!(second.get() > first.get());
    }

    #[test]
    fn sync_errors_report_param_status() {
        let error = SyncError::Overflow { count: 2, max: 1 };
        assert_eq!(error.status(), StatusCode::Param);
        assert_eq!(
            error.to_string(),
            "releasing 2 permits would exceed the maximum of 1"
        );
    }
}
