use parking_lot::{Condvar, Mutex};
use trace_protocol::StatusCode;

use super::{ObjectId, SyncError};
use crate::context::TraceArg;
use crate::tracer::Tracer;

const CREATE: &str = "Semaphore_Create";
const WAIT: &str = "Semaphore_Wait";
const RELEASE: &str = "Semaphore_Release";
const CLOSE: &str = "Semaphore_Close";

/// Counting semaphore with a fixed maximum.
#[derive(Debug)]
pub struct Semaphore {
    id: ObjectId,
    max: u32,
    count: Mutex<u32>,
    available: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `initial` of at most `max` permits.
    ///
    /// # Errors
    ///
    /// Fails when `max` is zero or `initial` exceeds it; the failure is
    /// reported with status [`StatusCode::Param`] and no object is created.
    pub fn new(tracer: &mut Tracer, initial: u32, max: u32) -> Result<Self, SyncError> {
        let invalid = if max == 0 {
            Some(SyncError::ZeroMaximum)
        } else if initial > max {
            Some(SyncError::InitialCount { initial, max })
        } else {
            None
        };
        if let Some(error) = invalid {
            tracer.status(CREATE, error.status());
            return Err(error);
        }

        let id = ObjectId::next();
        tracer.object_create(CREATE, id);
        tracer.write_match(&[TraceArg::Int(initial), TraceArg::Int(max)]);
        tracer.status(CREATE, StatusCode::Ok);
        Ok(Self {
            id,
            max,
            count: Mutex::new(initial),
            available: Condvar::new(),
        })
    }

    /// Handle of the semaphore.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Maximum number of permits.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Permits currently available.
    #[must_use]
    pub fn available(&self) -> u32 {
        *self.count.lock()
    }

    /// Blocks until a permit is available and takes it.
    pub fn wait(&self, tracer: &mut Tracer) -> StatusCode {
        {
            let mut count = self.count.lock();
            while *count == 0 {
                self.available.wait(&mut count);
            }
            *count -= 1;
        }
        tracer.object_sync(WAIT, self.id);
        tracer.status(WAIT, StatusCode::Ok);
        StatusCode::Ok
    }

    /// Returns `count` permits.
    ///
    /// # Errors
    ///
    /// Fails with [`SyncError::Overflow`] when the release would exceed the
    /// maximum; the count is left unchanged.
    pub fn release(&self, tracer: &mut Tracer, count: u32) -> Result<(), SyncError> {
        tracer.object_sync_value(RELEASE, self.id, count);
        let result = {
            let mut current = self.count.lock();
            match current.checked_add(count).filter(|total| *total <= self.max) {
                Some(total) => {
                    *current = total;
                    Ok(())
                }
                None => Err(SyncError::Overflow {
                    count,
                    max: self.max,
                }),
            }
        };
        match result {
            Ok(()) => {
                if count == 1 {
                    self.available.notify_one();
                } else {
                    self.available.notify_all();
                }
                tracer.status(RELEASE, StatusCode::Ok);
            }
            Err(error) => {
                tracer.status(RELEASE, error.status());
            }
        }
        result
    }

    /// Destroys the semaphore after the observer confirmed the deletion.
    pub fn close(self, tracer: &mut Tracer) {
        tracer.object_delete(CLOSE, self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut tracer = Tracer::disabled();
        assert_eq!(
            Semaphore::new(&mut tracer, 0, 0).unwrap_err(),
            SyncError::ZeroMaximum
        );
        assert_eq!(
            Semaphore::new(&mut tracer, 3, 2).unwrap_err(),
            SyncError::InitialCount { initial: 3, max: 2 }
        );
    }

    #[test]
    fn release_past_maximum_fails_without_saturating() {
        let mut tracer = Tracer::disabled();
        let semaphore = Semaphore::new(&mut tracer, 1, 2).expect("create");
        assert_eq!(
            semaphore.release(&mut tracer, 2),
            Err(SyncError::Overflow { count: 2, max: 2 })
        );
        assert_eq!(semaphore.available(), 1);
        semaphore.release(&mut tracer, 1).expect("release");
        assert_eq!(semaphore.available(), 2);
    }

    #[test]
    fn wait_takes_a_permit() {
        let mut tracer = Tracer::disabled();
        let semaphore = Semaphore::new(&mut tracer, 2, 2).expect("create");
        assert_eq!(semaphore.wait(&mut tracer), StatusCode::Ok);
        assert_eq!(semaphore.available(), 1);
        semaphore.close(&mut tracer);
    }

    #[test]
    fn waiter_wakes_on_release() {
        let mut tracer = Tracer::disabled();
        let semaphore = Arc::new(Semaphore::new(&mut tracer, 0, 1).expect("create"));
        let waiter = {
            let semaphore = Arc::clone(&semaphore);
            thread::spawn(move || semaphore.wait(&mut Tracer::disabled()))
        };
        semaphore.release(&mut tracer, 1).expect("release");
        assert_eq!(waiter.join().expect("waiter"), StatusCode::Ok);
        assert_eq!(semaphore.available(), 0);
    }
}
