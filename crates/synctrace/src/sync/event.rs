use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use trace_protocol::StatusCode;

use super::ObjectId;
use crate::tracer::Tracer;

const CREATE: &str = "Event_Create";
const WAIT: &str = "Event_Wait";
const SET: &str = "Event_Set";
const RESET: &str = "Event_Reset";
const CLOSE: &str = "Event_Close";

/// Single-permit event that resets itself when a waiter consumes it.
///
/// Backed by a one-slot channel: setting an already signaled event is a
/// no-op, and a wait takes the permit.
#[derive(Debug)]
pub struct AutoResetEvent {
    id: ObjectId,
    permit: Sender<()>,
    waiter: Receiver<()>,
}

impl AutoResetEvent {
    /// Creates an event in the non-signaled state.
    pub fn new(tracer: &mut Tracer) -> Self {
        let (permit, waiter) = bounded(1);
        let id = ObjectId::next();
        tracer.object_create(CREATE, id);
        tracer.status(CREATE, StatusCode::Ok);
        Self { id, permit, waiter }
    }

    /// Handle of the event.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Blocks until the event is signaled, consuming the signal.
    pub fn wait(&self, tracer: &mut Tracer) -> StatusCode {
        // both ends live in `self`, so the channel cannot disconnect
        let status = match self.waiter.recv() {
            Ok(()) => StatusCode::Ok,
            Err(_) => StatusCode::Fail,
        };
        tracer.object_sync(WAIT, self.id);
        tracer.status(WAIT, status);
        status
    }

    /// Signals the event, releasing one waiter.
    pub fn set(&self, tracer: &mut Tracer) -> StatusCode {
        tracer.object_sync(SET, self.id);
        let status = match self.permit.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => StatusCode::Ok,
            Err(TrySendError::Disconnected(())) => StatusCode::Fail,
        };
        tracer.status(SET, status);
        status
    }

    /// Clears a pending signal.
    pub fn reset(&self, tracer: &mut Tracer) -> StatusCode {
        tracer.object_sync(RESET, self.id);
        while self.waiter.try_recv().is_ok() {}
        tracer.status(RESET, StatusCode::Ok);
        StatusCode::Ok
    }

    /// Returns `true` when a signal is pending.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        !self.waiter.is_empty()
    }

    /// Destroys the event after the observer confirmed the deletion.
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
    fn set_is_consumed_by_one_wait() {
        let mut tracer = Tracer::disabled();
        let event = AutoResetEvent::new(&mut tracer);
        assert!(!event.is_signaled());
        event.set(&mut tracer);
        event.set(&mut tracer);
        assert!(event.is_signaled());
        assert_eq!(event.wait(&mut tracer), StatusCode::Ok);
        assert!(!event.is_signaled());
        event.close(&mut tracer);
    }

    #[test]
    fn reset_clears_the_signal() {
        let mut tracer = Tracer::disabled();
        let event = AutoResetEvent::new(&mut tracer);
        event.set(&mut tracer);
        event.reset(&mut tracer);
        assert!(!event.is_signaled());
    }

    #[test]
    fn wait_blocks_until_another_thread_sets() {
        let mut tracer = Tracer::disabled();
        let event = Arc::new(AutoResetEvent::new(&mut tracer));
        let setter = {
            let event = Arc::clone(&event);
            thread::spawn(move || event.set(&mut Tracer::disabled()))
        };
        assert_eq!(event.wait(&mut tracer), StatusCode::Ok);
        assert_eq!(setter.join().expect("setter"), StatusCode::Ok);
    }
}
