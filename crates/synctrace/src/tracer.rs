use std::sync::Arc;

use trace_protocol::{
    LifecycleOp, OBJECT_CTOR, STATUS_CODE, StatusCode, THREAD_CTOR, THREAD_DTOR, THREAD_WAIT,
};

use crate::context::{TraceArg, TraceContext};
use crate::lock::GlobalLock;
use crate::session::TraceSession;
use crate::sync::ObjectId;
use crate::violation::ProtocolViolation;

/// The calling thread's handle on the trace.
///
/// Either disabled, in which case every operation is a no-op, or attached to
/// a [`TraceSession`] through the thread's own [`TraceContext`]. Tracers are
/// passed explicitly to every instrumented operation instead of living in
/// thread-local storage.
#[derive(Debug, Default)]
pub struct Tracer {
    context: Option<TraceContext>,
}

impl Tracer {
    /// A tracer that records nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { context: None }
    }

    pub(crate) fn attach(session: Arc<TraceSession>, thread: u32) -> Self {
        Self {
            context: Some(TraceContext::attach(session, thread)),
        }
    }

    /// Returns `true` when attached to a session.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.context.is_some()
    }

    /// Identifier of the calling thread within the session.
    #[must_use]
    pub fn thread_id(&self) -> Option<u32> {
        self.context.as_ref().map(TraceContext::thread)
    }

    /// Session the tracer is attached to.
    #[must_use]
    pub fn session(&self) -> Option<&Arc<TraceSession>> {
        self.context.as_ref().map(TraceContext::session)
    }

    /// The underlying context, for direct protocol access.
    pub fn context_mut(&mut self) -> Option<&mut TraceContext> {
        self.context.as_mut()
    }

    /// Takes the session's process-wide lock; see [`GlobalLock`].
    pub fn global_lock(&self) -> GlobalLock {
        GlobalLock::acquire(self.session().cloned())
    }

    /// Interned key of `text`, or 0 when disabled.
    pub fn map_string(&mut self, text: &str) -> u32 {
        self.context
            .as_mut()
            .map_or(0, |context| context.map_string(text))
    }

    /// Writes an acknowledged match record; see [`TraceContext::write_match`].
    pub fn write_match(&mut self, args: &[TraceArg<'_>]) {
        if let Some(context) = self.context.as_mut() {
            context.write_match(args);
        }
    }

    /// Writes an acknowledged command; see [`TraceContext::write_cmd`].
    pub fn write_cmd(&mut self, cmd: u8, handle: Option<ObjectId>, args: &[TraceArg<'_>]) {
        if let Some(context) = self.context.as_mut() {
            context.write_cmd(cmd, handle.map(ObjectId::get), args);
        }
    }

    /// Waits for an acknowledgment; see [`TraceContext::wait_for_ack`].
    pub fn wait_for_ack(&mut self, opcode: u8, key: u32) {
        if let Some(context) = self.context.as_mut() {
            context.wait_for_ack(opcode, key);
        }
    }

    /// Reports the result of the primitive operation `label` and returns `code`.
    ///
    /// Only the values of [`StatusCode`] are accepted; anything else is a
    /// protocol violation.
    pub fn status(&mut self, label: &str, code: impl Into<u32>) -> u32 {
        let code = code.into();
        if let Some(context) = self.context.as_mut() {
            if StatusCode::from_u32(code).is_none() {
                context.session().fatal(ProtocolViolation::InvalidStatus {
                    label: label.to_owned(),
                    code,
                });
            }
            context.write_cmd(STATUS_CODE, None, &[TraceArg::Str(label), TraceArg::Int(code)]);
        }
        code
    }

    /// Records the creation of `object`.
    pub fn object_create(&mut self, label: &str, object: ObjectId) {
        self.write_cmd(OBJECT_CTOR, Some(object), &[TraceArg::Str(label)]);
    }

    /// Records the imminent destruction of `object`.
    ///
    /// The record goes through the root channel; the acknowledgment comes
    /// back on this thread's channel once the observer has seen it.
    pub fn object_delete(&mut self, label: &str, object: ObjectId) {
        self.root_round_trip(LifecycleOp::ObjectDtor, label, object, &[]);
    }

    /// Records a synchronisation point on `object`.
    pub fn object_sync(&mut self, label: &str, object: ObjectId) {
        self.root_round_trip(LifecycleOp::ObjectWait1, label, object, &[]);
    }

    /// Records a synchronisation point on `object` carrying `value`.
    pub fn object_sync_value(&mut self, label: &str, object: ObjectId, value: u32) {
        self.root_round_trip(LifecycleOp::ObjectWait2, label, object, &[value]);
    }

    pub(crate) fn thread_create(&mut self, thread: u32) {
        self.write_cmd(THREAD_CTOR, None, &[TraceArg::Int(thread)]);
    }

    pub(crate) fn thread_wait(&mut self, thread: u32) {
        self.write_cmd(THREAD_WAIT, None, &[TraceArg::Int(thread)]);
    }

    pub(crate) fn thread_close(&mut self, thread: u32) {
        self.write_cmd(THREAD_DTOR, None, &[TraceArg::Int(thread)]);
    }

    /// Ends this thread's record stream with the end-of-stream handshake.
    pub fn detach(self) {
        if let Some(context) = self.context {
            context.detach();
        }
    }

    fn root_round_trip(&mut self, op: LifecycleOp, label: &str, object: ObjectId, values: &[u32]) {
        if let Some(context) = self.context.as_mut() {
            context.ensure_attached("write a root record");
            let ack = context.session().write_record(
                op,
                context.thread(),
                Some(object.get()),
                Some(label),
                values,
            );
            context.wait_for_ack(ack.opcode, ack.key);
        }
    }
}
