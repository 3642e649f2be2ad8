use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::session::TraceSession;

#[derive(Debug)]
struct Owner {
    thread: Option<ThreadId>,
    depth: usize,
}

/// Process-wide lock that the owning thread may take again while holding it.
#[derive(Debug)]
pub(crate) struct ReentrantLock {
    owner: Mutex<Owner>,
    released: Condvar,
}

impl ReentrantLock {
    pub(crate) const fn new() -> Self {
        Self {
            owner: Mutex::new(Owner {
                thread: None,
                depth: 0,
            }),
            released: Condvar::new(),
        }
    }

    pub(crate) fn acquire(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        loop {
            match owner.thread {
                None => {
                    owner.thread = Some(me);
                    owner.depth = 1;
                    return;
                }
                Some(holder) if holder == me => {
                    owner.depth += 1;
                    return;
                }
                Some(_) => self.released.wait(&mut owner),
            }
        }
    }

    pub(crate) fn release(&self) {
        let mut owner = self.owner.lock();
        debug_assert_eq!(owner.thread, Some(thread::current().id()));
        owner.depth = owner.depth.saturating_sub(1);
        if owner.depth == 0 {
            owner.thread = None;
            drop(owner);
            self.released.notify_one();
        }
    }

    pub(crate) fn enter(&self) -> ReentrantGuard<'_> {
        self.acquire();
        ReentrantGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.owner.lock().depth
    }
}

/// Scoped hold on a [`ReentrantLock`].
pub(crate) struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Hold on the session's process-wide trace lock.
///
/// While a thread holds it, no other thread can intern strings or write
/// root-channel records, so a sequence of primitive operations and their
/// records appears atomic to the observer. The owning thread may keep
/// emitting records. A guard obtained from a disabled [`Tracer`] holds
/// nothing.
///
/// [`Tracer`]: crate::Tracer
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct GlobalLock {
    session: Option<Arc<TraceSession>>,
    _not_send: PhantomData<*const ()>,
}

impl GlobalLock {
    pub(crate) fn acquire(session: Option<Arc<TraceSession>>) -> Self {
        if let Some(session) = &session {
            session.lock().acquire();
        }
        Self {
            session,
            _not_send: PhantomData,
        }
    }

    /// Returns `true` when the guard actually holds a session lock.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for GlobalLock {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.lock().release();
        }
    }
}

impl std::fmt::Debug for GlobalLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalLock")
            .field("held", &self.is_held())
            .finish()
    }
}
