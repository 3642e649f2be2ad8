use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, MutexGuard};

use super::ObjectId;
use crate::tracer::Tracer;

const INIT: &str = "CriticalSection_Init";
const ENTER: &str = "CriticalSection_Enter";
const LEAVE: &str = "CriticalSection_Leave";
const DELETE: &str = "CriticalSection_Delete";

/// Mutual exclusion around `T` whose enter and leave are traced.
#[derive(Debug)]
pub struct CriticalSection<T> {
    id: ObjectId,
    data: Mutex<T>,
}

impl<T> CriticalSection<T> {
    /// Wraps `value`.
    pub fn new(tracer: &mut Tracer, value: T) -> Self {
        let id = ObjectId::next();
        tracer.object_create(INIT, id);
        Self {
            id,
            data: Mutex::new(value),
        }
    }

    /// Handle of the critical section.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Acquires the section.
    ///
    /// The guard borrows `tracer` so that leaving can be traced; use
    /// [`CriticalSectionGuard::tracer`] to keep emitting records inside.
    pub fn enter<'a>(&'a self, tracer: &'a mut Tracer) -> CriticalSectionGuard<'a, T> {
        let data = self.data.lock();
        tracer.object_sync(ENTER, self.id);
        CriticalSectionGuard {
            id: self.id,
            tracer,
            data,
        }
    }

    /// Destroys the section and returns the protected value.
    pub fn close(self, tracer: &mut Tracer) -> T {
        tracer.object_delete(DELETE, self.id);
        self.data.into_inner()
    }
}

/// Access to the data of an entered [`CriticalSection`].
pub struct CriticalSectionGuard<'a, T> {
    id: ObjectId,
    tracer: &'a mut Tracer,
    data: MutexGuard<'a, T>,
}

impl<T> CriticalSectionGuard<'_, T> {
    /// The tracer of the thread holding the section.
    pub fn tracer(&mut self) -> &mut Tracer {
        self.tracer
    }
}

impl<T> Deref for CriticalSectionGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for CriticalSectionGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T> Drop for CriticalSectionGuard<'_, T> {
    fn drop(&mut self) {
        // the mutex guard field is released after this body runs
        self.tracer.object_sync(LEAVE, self.id);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CriticalSectionGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriticalSectionGuard")
            .field("id", &self.id)
            .field("data", &*self.data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn guard_gives_exclusive_access() {
        let mut tracer = Tracer::disabled();
        let section = Arc::new(CriticalSection::new(&mut tracer, 0u64));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let section = Arc::clone(&section);
                thread::spawn(move || {
                    let mut tracer = Tracer::disabled();
                    for _ in 0..1000 {
                        *section.enter(&mut tracer) += 1;
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }
        let section = Arc::try_unwrap(section).expect("sole owner");
        assert_eq!(section.close(&mut tracer), 4000);
    }

    #[test]
    fn guard_exposes_the_tracer() {
        let mut tracer = Tracer::disabled();
        let section = CriticalSection::new(&mut tracer, vec![1u8]);
        let mut guard = section.enter(&mut tracer);
        guard.push(2);
        assert!(!guard.tracer().is_enabled());
        drop(guard);
        assert_eq!(section.close(&mut tracer), vec![1, 2]);
    }
}
