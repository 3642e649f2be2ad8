use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::context::ContextState;
use crate::violation::ProtocolViolation;

/// Lifecycle state of every thread context of a session, keyed by thread id.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    threads: Mutex<FxHashMap<u32, ContextState>>,
}

impl Registry {
    pub(crate) fn register(&self, thread: u32) -> Result<(), ProtocolViolation> {
        let mut threads = self.threads.lock();
        if threads.contains_key(&thread) {
            return Err(ProtocolViolation::AlreadyAttached(thread));
        }
        threads.insert(thread, ContextState::Attached);
        Ok(())
    }

    pub(crate) fn set_state(&self, thread: u32, state: ContextState) {
        let mut threads = self.threads.lock();
        if state == ContextState::Closed {
            threads.remove(&thread);
        } else {
            threads.insert(thread, state);
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self, thread: u32) -> Option<ContextState> {
        self.threads.lock().get(&thread).copied()
    }

    /// Threads whose contexts have not closed yet, in ascending order.
    pub(crate) fn attached(&self) -> Vec<u32> {
        let mut threads: Vec<u32> = self.threads.lock().keys().copied().collect();
        threads.sort_unstable();
        threads
    }
}
