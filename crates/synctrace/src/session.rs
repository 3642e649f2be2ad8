use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use trace_io::{Channel, Transport, root_channel_name};
use trace_protocol::{
    Ack, LifecycleOp, LifecycleRecord, MAX_STRING_LEN, RecordError, RootRecord, SequenceCounter,
};

use crate::config::TraceConfig;
use crate::lock::{GlobalLock, ReentrantLock};
use crate::registry::Registry;
use crate::string_table::StringTable;
use crate::tracer::Tracer;
use crate::violation::{ProtocolViolation, fatal};

const TARGET: &str = "synctrace::session";

/// Thread identifier given to the thread that starts the session.
pub const MAIN_THREAD_ID: u32 = 1;

static CURRENT: Mutex<Option<Arc<TraceSession>>> = Mutex::new(None);

/// Root-channel state, only touched while the session lock is held.
struct RootState {
    channel: Channel,
    strings: StringTable,
    seq: SequenceCounter,
    buf: Vec<u8>,
}

impl RootState {
    fn write(&mut self, record: &RootRecord) -> Result<(), ProtocolViolation> {
        self.buf.clear();
        record.encode_into(&mut self.buf)?;
        self.channel.write(&self.buf)?;
        Ok(())
    }

    fn intern(&mut self, text: &str) -> Result<u32, ProtocolViolation> {
        if text.len() > MAX_STRING_LEN {
            return Err(RecordError::StringTooLong(text.len()).into());
        }
        let (key, inserted) = self.strings.intern(text);
        if inserted {
            self.write(&RootRecord::string_map(text)?)?;
            tracing::trace!(target: TARGET, key, label = text, "interned string");
        }
        Ok(key)
    }
}

/// The process-wide tracing root.
///
/// Owns the root channel, the shared string table, the process-wide lock,
/// the root sequence counter and the registry of attached threads. Exactly
/// one session can run per process; [`TraceSession::current`] exposes it so
/// spawned threads can attach.
pub struct TraceSession {
    name: String,
    transport: Arc<dyn Transport>,
    config: TraceConfig,
    lock: ReentrantLock,
    root: Mutex<RootState>,
    registry: Registry,
    next_thread: AtomicU32,
}

impl TraceSession {
    /// Starts the session `id` and attaches the calling thread.
    ///
    /// Blocks until the observer has connected to the root channel and to
    /// the calling thread's channel. Returns the calling thread's tracer,
    /// which must eventually be handed to [`TraceSession::stop`].
    ///
    /// Starting a second session while one is running is a protocol
    /// violation.
    pub fn init(id: &str, transport: Arc<dyn Transport>, config: TraceConfig) -> Tracer {
        let policy = config.violation_policy();
        let mut current = CURRENT.lock();
        if current.is_some() {
            fatal(policy, ProtocolViolation::SessionExists);
        }

        let channel = transport
            .listen(&root_channel_name(id))
            .unwrap_or_else(|error| fatal(policy, error));
        let session = Arc::new(Self {
            name: id.to_owned(),
            transport,
            config,
            lock: ReentrantLock::new(),
            root: Mutex::new(RootState {
                channel,
                strings: StringTable::new(),
                seq: SequenceCounter::new(),
                buf: Vec::with_capacity(64),
            }),
            registry: Registry::default(),
            next_thread: AtomicU32::new(MAIN_THREAD_ID + 1),
        });

        {
            let _lock = session.lock.enter();
            let mut root = session.root.lock();
            let seq = root.seq.next();
            if let Err(violation) = root.write(&RootRecord::Init {
                thread: MAIN_THREAD_ID,
                seq,
            }) {
                fatal(policy, violation);
            }
        }
        *current = Some(Arc::clone(&session));
        drop(current);

        tracing::info!(target: TARGET, session = id, "trace session started");
        Tracer::attach(session, MAIN_THREAD_ID)
    }

    /// Detaches `tracer` (the thread that called [`TraceSession::init`]),
    /// then flushes and closes the root channel under the session lock and
    /// clears the process-wide session.
    ///
    /// A disabled tracer makes this a no-op.
    pub fn stop(tracer: Tracer) {
        let Some(session) = tracer.session().cloned() else {
            return;
        };
        tracer.detach();

        let still_attached = session.registry.attached();
        if !still_attached.is_empty() {
            tracing::warn!(
                target: TARGET,
                threads = ?still_attached,
                "stopping session with attached threads"
            );
        }

        {
            let _lock = session.lock.enter();
            let mut root = session.root.lock();
            let closed = root.channel.flush().and_then(|()| root.channel.close());
            if let Err(error) = closed {
                session.fatal(error);
            }
        }

        let mut current = CURRENT.lock();
        if current
            .as_ref()
            .is_some_and(|running| Arc::ptr_eq(running, &session))
        {
            *current = None;
        }
        tracing::info!(target: TARGET, session = %session.name, "trace session stopped");
    }

    /// The running session, if any.
    #[must_use]
    pub fn current() -> Option<Arc<Self>> {
        CURRENT.lock().clone()
    }

    /// Session identifier used to derive channel names.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Takes the process-wide trace lock.
    ///
    /// The lock is reentrant: the holder may keep tracing, and other threads
    /// block as soon as they need the string table or the root channel.
    pub fn global_lock(self: &Arc<Self>) -> GlobalLock {
        GlobalLock::acquire(Some(Arc::clone(self)))
    }

    /// Returns the key of `text`, writing a string-table record the first
    /// time any thread interns it.
    pub fn intern(&self, text: &str) -> u32 {
        let _lock = self.lock.enter();
        let result = self.root.lock().intern(text);
        result.unwrap_or_else(|violation| self.fatal(violation))
    }

    /// Writes a lifecycle record on the root channel on behalf of `thread`.
    ///
    /// `label` is interned and becomes the first argument of object and
    /// status records; `values` supplies the remaining arguments. Returns the
    /// acknowledgment the observer will send on `thread`'s own channel.
    pub fn write_record(
        &self,
        op: LifecycleOp,
        thread: u32,
        handle: Option<u32>,
        label: Option<&str>,
        values: &[u32],
    ) -> Ack {
        let _lock = self.lock.enter();
        let mut root = self.root.lock();
        let result = (|| {
            let mut args = Vec::with_capacity(values.len() + 1);
            if let Some(label) = label {
                args.push(root.intern(label)?);
            }
            args.extend_from_slice(values);
            let seq = root.seq.next();
            let record = LifecycleRecord::new(op, thread, handle, &args, seq)?;
            root.write(&RootRecord::Lifecycle(record))?;
            tracing::trace!(target: TARGET, ?op, thread, ?handle, seq, "root record");
            Ok::<_, ProtocolViolation>(record.ack())
        })();
        drop(root);
        result.unwrap_or_else(|violation| self.fatal(violation))
    }

    /// Allocates an identifier for a thread about to be spawned.
    pub fn allocate_thread_id(&self) -> u32 {
        self.next_thread.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) const fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) const fn lock(&self) -> &ReentrantLock {
        &self.lock
    }

    /// Logs `violation` and applies the session's violation policy.
    pub fn fatal(&self, violation: impl Into<ProtocolViolation>) -> ! {
        fatal(self.config.violation_policy(), violation)
    }
}

impl fmt::Debug for TraceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSession")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
