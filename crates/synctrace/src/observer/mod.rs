//! The observer side of the trace protocol.
//!
//! An [`Observer`] connects to every channel of a running session, mirrors
//! its string table, and acknowledges each record once it has been appended
//! to a totally ordered event log. Because every traced thread blocks until
//! its record is acknowledged, the log order is an interleaving the traced
//! process actually executed, and a [`Scheduler`] can steer which one.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use synctrace::observer::{Observer, ObserverConfig};
//! use synctrace::{TraceConfig, TraceSession};
//! use trace_io::{MemoryTransport, Transport};
//!
//! let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
//! let observer = Observer::connect(Arc::clone(&transport), "doc", ObserverConfig::default())
//!     .expect("observer");
//!
//! let mut tracer = TraceSession::init("doc", transport, TraceConfig::default());
//! tracer.status("Example", 0u32);
//! TraceSession::stop(tracer);
//!
//! let log = observer.join().expect("clean trace");
//! assert_eq!(log[0].status().map(|(label, _)| label), Some("Example"));
//! assert!(log[1].is_end_of_stream());
//! ```

mod error;
mod event;

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use trace_io::{ChannelWriter, Transport, root_channel_name, thread_channel_name};
use trace_protocol::{
    ArgKind, CommandTable, ContextRecord, INIT_TRACE, LifecycleOp, LifecycleRecord, RootRecord,
    SequenceCounter, THREAD_CTOR,
};

pub use self::error::ObserverError;
pub use self::event::{ObservedEvent, ObservedRecord};
use crate::string_table::StringTable;

const TARGET: &str = "synctrace::observer";

/// How long a reader waits for a string key or a thread channel that
/// another reader has not delivered yet.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Hook consulted before every acknowledgment.
///
/// The calling reader thread holds back the acknowledgment, and therefore
/// the traced thread, until the hook returns. Hooks run outside the
/// observer lock.
pub trait Scheduler: Send + Sync {
    /// Called with the record about to be acknowledged.
    fn before_ack(&self, event: &ObservedEvent);
}

/// Acknowledges every record as soon as it arrives.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn before_ack(&self, _event: &ObservedEvent) {}
}

impl<F> Scheduler for F
where
    F: Fn(&ObservedEvent) + Send + Sync,
{
    fn before_ack(&self, event: &ObservedEvent) {
        self(event);
    }
}

/// Settings of an [`Observer`].
#[derive(Clone)]
pub struct ObserverConfig {
    commands: CommandTable,
    resolve_timeout: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl ObserverConfig {
    /// Sets the table used to decode escaped commands.
    #[must_use]
    pub fn with_commands(mut self, commands: CommandTable) -> Self {
        self.commands = commands;
        self
    }

    /// Sets how long to wait for strings and thread channels.
    #[must_use]
    pub const fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Installs an acknowledgment hook.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Command table.
    #[must_use]
    pub const fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Resolve timeout.
    #[must_use]
    pub const fn resolve_timeout(&self) -> Duration {
        self.resolve_timeout
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            commands: CommandTable::builtin(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            scheduler: Arc::new(Immediate),
        }
    }
}

impl fmt::Debug for ObserverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverConfig")
            .field("resolve_timeout", &self.resolve_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct State {
    strings: StringTable,
    writers: FxHashMap<u32, ChannelWriter>,
    announced: FxHashSet<u32>,
    log: Vec<ObservedEvent>,
    error: Option<ObserverError>,
    readers: Vec<JoinHandle<()>>,
}

struct Shared {
    session: String,
    transport: Arc<dyn Transport>,
    config: ObserverConfig,
    state: Mutex<State>,
    changed: Condvar,
}

/// Peer of a [`TraceSession`](crate::TraceSession).
///
/// Runs one reader thread for the root channel and one per traced thread.
pub struct Observer {
    shared: Arc<Shared>,
}

impl Observer {
    /// Starts observing `session`.
    ///
    /// Returns immediately; the root reader keeps retrying until the session
    /// listens or the transport's connect timeout elapses, in which case
    /// [`Observer::join`] reports the failure.
    ///
    /// # Errors
    ///
    /// Fails when the root reader thread cannot be spawned.
    pub fn connect(
        transport: Arc<dyn Transport>,
        session: &str,
        config: ObserverConfig,
    ) -> Result<Self, ObserverError> {
        let shared = Arc::new(Shared {
            session: session.to_owned(),
            transport,
            config,
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
        });
        {
            let mut state = shared.state.lock();
            shared.spawn_reader(&mut state, "observer-root".to_owned(), |shared| {
                shared.read_root()
            })?;
        }
        Ok(Self { shared })
    }

    /// Copy of the events acknowledged so far.
    #[must_use]
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.shared.state.lock().log.clone()
    }

    /// Waits until the root channel closed and every thread delivered its
    /// end-of-stream record.
    ///
    /// # Errors
    ///
    /// Returns the first error any reader ran into.
    pub fn join(self) -> Result<Vec<ObservedEvent>, ObserverError> {
        loop {
            let readers = std::mem::take(&mut self.shared.state.lock().readers);
            if readers.is_empty() {
                break;
            }
            for reader in readers {
                if reader.join().is_err() {
                    self.shared.fail(ObserverError::ThreadPanicked);
                }
            }
        }

        let mut state = self.shared.state.lock();
        match state.error.take() {
            Some(error) => Err(error),
            None => Ok(std::mem::take(&mut state.log)),
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("session", &self.shared.session)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn spawn_reader<F>(
        self: &Arc<Self>,
        state: &mut State,
        name: String,
        body: F,
    ) -> Result<(), ObserverError>
    where
        F: FnOnce(&Arc<Self>) -> Result<(), ObserverError> + Send + 'static,
    {
        let shared = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                if let Err(error) = body(&shared) {
                    shared.fail(error);
                }
            })
            .map_err(ObserverError::Spawn)?;
        state.readers.push(handle);
        Ok(())
    }

    fn fail(&self, error: ObserverError) {
        tracing::warn!(target: TARGET, session = %self.session, %error, "observer failed");
        let mut state = self.state.lock();
        if state.error.is_none() {
            state.error = Some(error);
        }
        // dropping the write halves unblocks traced threads waiting for acks
        state.writers.clear();
        drop(state);
        self.changed.notify_all();
    }

    fn read_root(self: &Arc<Self>) -> Result<(), ObserverError> {
        let name = root_channel_name(&self.session);
        let mut channel = self.transport.connect(&name)?;
        let reader = channel.reader()?;
        let mut seq = SequenceCounter::new();

        match RootRecord::read_from(&mut *reader).map_err(|error| ObserverError::record(&name, error))? {
            RootRecord::Init { thread, seq: actual } => {
                seq.check(actual)
                    .map_err(|error| ObserverError::record(&name, error))?;
                tracing::debug!(target: TARGET, session = %self.session, thread, "session initialised");
                self.announce(thread)?;
            }
            other => {
                return Err(ObserverError::MissingInit {
                    channel: name,
                    opcode: other.opcode(),
                });
            }
        }

        loop {
            let record = match RootRecord::read_from(&mut *reader) {
                Ok(record) => record,
                Err(error) if error.is_clean_eof() => break,
                Err(error) => return Err(ObserverError::record(&name, error)),
            };
            match record {
                RootRecord::Init { .. } => {
                    return Err(ObserverError::UnexpectedRecord {
                        channel: name,
                        opcode: INIT_TRACE,
                    });
                }
                RootRecord::StringMap { text } => {
                    let key = self.state.lock().strings.push(text);
                    self.changed.notify_all();
                    tracing::trace!(target: TARGET, key, "string mapped");
                }
                RootRecord::Lifecycle(record) => {
                    seq.check(record.seq())
                        .map_err(|error| ObserverError::record(&name, error))?;
                    self.on_root_record(record)?;
                }
            }
        }

        tracing::debug!(target: TARGET, session = %self.session, "root channel closed");
        Ok(())
    }

    fn on_root_record(self: &Arc<Self>, record: LifecycleRecord) -> Result<(), ObserverError> {
        let op = record.op();
        if op == LifecycleOp::ThreadCtor {
            if let Some(&child) = record.args().first() {
                self.announce(child)?;
            }
        }
        let event = ObservedEvent {
            thread: record.thread(),
            record: ObservedRecord::Root(record),
            labels: self.resolve_labels(op.arg_shape().kinds(), record.args())?,
        };
        if op.is_acknowledged() {
            self.acknowledge(event)
        } else {
            self.state.lock().log.push(event);
            Ok(())
        }
    }

    fn read_thread(self: &Arc<Self>, thread: u32) -> Result<(), ObserverError> {
        let name = thread_channel_name(&self.session, thread);
        let (mut reader, writer) = self.transport.connect(&name)?.into_split()?;
        self.state.lock().writers.insert(thread, writer);
        self.changed.notify_all();
        tracing::debug!(target: TARGET, thread, channel = %name, "thread channel connected");

        let commands = &self.config.commands;
        let mut seq = SequenceCounter::new();
        loop {
            let record = match ContextRecord::read_from(reader.reader(), commands) {
                Ok(record) => record,
                Err(error) if error.is_clean_eof() => {
                    return Err(ObserverError::Disconnected { thread });
                }
                Err(error) => return Err(ObserverError::record(&name, error)),
            };
            seq.check(record.seq())
                .map_err(|error| ObserverError::record(&name, error))?;

            let labels = match record {
                ContextRecord::Match { shape, args, .. } => {
                    self.resolve_labels(shape.kinds(), args.as_slice())?
                }
                ContextRecord::Command { cmd, args, .. } => {
                    let spec = commands
                        .require(cmd)
                        .map_err(|error| ObserverError::record(&name, error))?;
                    if cmd == THREAD_CTOR {
                        if let Some(&child) = args.as_slice().first() {
                            self.announce(child)?;
                        }
                    }
                    self.resolve_labels(spec.shape.kinds(), args.as_slice())?
                }
                ContextRecord::EndOfStream { thread: sender, .. } if sender != thread => {
                    return Err(ObserverError::UnexpectedRecord {
                        channel: name,
                        opcode: record.opcode(),
                    });
                }
                ContextRecord::EndOfStream { .. } => Vec::new(),
            };

            let done = matches!(record, ContextRecord::EndOfStream { .. });
            self.acknowledge(ObservedEvent {
                thread,
                record: ObservedRecord::Context(record),
                labels,
            })?;
            if done {
                self.state.lock().writers.remove(&thread);
                tracing::debug!(target: TARGET, thread, "thread detached");
                return Ok(());
            }
        }
    }

    /// Starts reading the channel of `thread`.
    fn announce(self: &Arc<Self>, thread: u32) -> Result<(), ObserverError> {
        let mut state = self.state.lock();
        if !state.announced.insert(thread) {
            return Err(ObserverError::DuplicateThread { thread });
        }
        self.spawn_reader(&mut state, format!("observer-{thread:08x}"), move |shared| {
            shared.read_thread(thread)
        })
    }

    fn resolve_labels(
        &self,
        kinds: &[ArgKind],
        values: &[u32],
    ) -> Result<Vec<String>, ObserverError> {
        let strings: Vec<u32> = kinds
            .iter()
            .zip(values)
            .filter(|(kind, _)| **kind == ArgKind::Str)
            .map(|(_, key)| *key)
            .collect();
        if strings.is_empty() {
            return Ok(Vec::new());
        }

        let timeout = self.config.resolve_timeout;
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let mut labels = Vec::with_capacity(strings.len());
        for key in strings {
            loop {
                if let Some(text) = state.strings.resolve(key) {
                    labels.push(text.to_owned());
                    break;
                }
                if self.changed.wait_until(&mut state, deadline).timed_out() {
                    return Err(ObserverError::UnknownString { key, timeout });
                }
            }
        }
        Ok(labels)
    }

    fn acknowledge(&self, event: ObservedEvent) -> Result<(), ObserverError> {
        self.config.scheduler.before_ack(&event);

        let ack = event.record.ack();
        let deadline = Instant::now() + self.config.resolve_timeout;
        let mut state = self.state.lock();
        while !state.writers.contains_key(&event.thread) {
            if state.error.is_some() || self.changed.wait_until(&mut state, deadline).timed_out() {
                return Err(ObserverError::UnknownThread {
                    thread: event.thread,
                });
            }
        }
        tracing::trace!(target: TARGET, %event, "acknowledging");
        let thread = event.thread;
        state.log.push(event);
        if let Some(writer) = state.writers.get_mut(&thread) {
            writer.write(&ack.encode())?;
        }
        Ok(())
    }
}
