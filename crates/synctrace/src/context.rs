use std::fmt;
use std::sync::Arc;
use std::thread;

use trace_io::{Channel, thread_channel_name};
use trace_protocol::{
    ACK_LEN, Ack, ArgKind, ArgShape, ContextRecord, MAX_ARGS, SequenceCounter, validate_command,
};

use crate::session::TraceSession;
use crate::string_table::StringCache;
use crate::violation::ProtocolViolation;

const TARGET: &str = "synctrace::context";

/// Lifecycle of a [`TraceContext`]: `Attached → Detaching → Closed`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ContextState {
    /// The context may emit records.
    Attached,
    /// The end-of-stream handshake is in progress.
    Detaching,
    /// The channel is closed.
    Closed,
}

/// One argument of a match or command record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceArg<'a> {
    /// Raw integer.
    Int(u32),
    /// Label, sent as its interned key.
    Str(&'a str),
}

impl From<u32> for TraceArg<'_> {
    fn from(value: u32) -> Self {
        Self::Int(value)
    }
}

impl<'a> From<&'a str> for TraceArg<'a> {
    fn from(value: &'a str) -> Self {
        Self::Str(value)
    }
}

/// Per-thread tracing endpoint.
///
/// Owns a private channel to the observer named after the session and the
/// thread id, a read-through cache of string keys, and the thread's own
/// sequence counter. Every record written here blocks until the observer's
/// acknowledgment arrives, so at most one record per thread is ever
/// unacknowledged.
pub struct TraceContext {
    session: Arc<TraceSession>,
    thread: u32,
    channel: Channel,
    cache: StringCache,
    seq: SequenceCounter,
    state: ContextState,
    buf: Vec<u8>,
}

impl TraceContext {
    /// Registers `thread` with `session` and waits for the observer to
    /// connect to the thread's channel.
    pub(crate) fn attach(session: Arc<TraceSession>, thread: u32) -> Self {
        if let Err(violation) = session.registry().register(thread) {
            session.fatal(violation);
        }
        let name = thread_channel_name(session.name(), thread);
        let channel = session
            .transport()
            .listen(&name)
            .unwrap_or_else(|error| session.fatal(error));
        tracing::debug!(target: TARGET, thread, channel = %name, "context attached");

        Self {
            session,
            thread,
            channel,
            cache: StringCache::default(),
            seq: SequenceCounter::new(),
            state: ContextState::Attached,
            buf: Vec::with_capacity(32),
        }
    }

    /// Identifier of the owning thread.
    #[must_use]
    pub const fn thread(&self) -> u32 {
        self.thread
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ContextState {
        self.state
    }

    /// Session this context belongs to.
    #[must_use]
    pub const fn session(&self) -> &Arc<TraceSession> {
        &self.session
    }

    /// Returns the key of `text`, consulting the thread-local cache before
    /// interning through the session.
    pub fn map_string(&mut self, text: &str) -> u32 {
        if let Some(key) = self.cache.get(text) {
            return key;
        }
        let key = self.session.intern(text);
        self.cache.insert(text, key);
        key
    }

    /// Writes a match record with one to three arguments and waits for its
    /// acknowledgment.
    pub fn write_match(&mut self, args: &[TraceArg<'_>]) {
        self.ensure_attached("write a match record");
        if args.is_empty() || args.len() > MAX_ARGS {
            self.session.fatal(ProtocolViolation::MatchArity(args.len()));
        }
        let (shape, values) = self.resolve(args);
        let seq = self.seq.next();
        let record = ContextRecord::matching(shape, &values[..args.len()], seq)
            .unwrap_or_else(|error| self.session.fatal(error));
        self.send(&record);
    }

    /// Writes an escaped command and waits for its acknowledgment.
    ///
    /// `cmd` must not carry the escape bit; the observer needs a matching
    /// entry in its command table to decode the record.
    pub fn write_cmd(&mut self, cmd: u8, handle: Option<u32>, args: &[TraceArg<'_>]) {
        self.ensure_attached("write a command");
        if let Err(error) = validate_command(cmd) {
            self.session.fatal(error);
        }
        if args.len() > MAX_ARGS {
            self.session.fatal(ProtocolViolation::MatchArity(args.len()));
        }
        let (_, values) = self.resolve(args);
        let seq = self.seq.next();
        let record = ContextRecord::command(cmd, handle, &values[..args.len()], seq)
            .unwrap_or_else(|error| self.session.fatal(error));
        self.send(&record);
    }

    /// Blocks until the acknowledgment `(opcode, key)` arrives.
    ///
    /// Used after a record was issued through the session's root channel on
    /// behalf of this thread.
    pub fn wait_for_ack(&mut self, opcode: u8, key: u32) {
        self.ensure_attached("wait for an acknowledgment");
        self.await_ack(Ack::new(opcode, key));
    }

    /// Sends the end-of-stream record, waits for its acknowledgment and
    /// closes the channel.
    pub fn detach(mut self) {
        self.finish();
    }

    pub(crate) fn ensure_attached(&self, operation: &'static str) {
        if self.state != ContextState::Attached {
            self.session.fatal(ProtocolViolation::InvalidState {
                thread: self.thread,
                state: self.state,
                operation,
            });
        }
    }

    fn resolve(&mut self, args: &[TraceArg<'_>]) -> (ArgShape, [u32; MAX_ARGS]) {
        let mut kinds = [ArgKind::Int; MAX_ARGS];
        let mut values = [0u32; MAX_ARGS];
        for (slot, arg) in args.iter().take(MAX_ARGS).enumerate() {
            match *arg {
                TraceArg::Int(value) => values[slot] = value,
                TraceArg::Str(text) => {
                    kinds[slot] = ArgKind::Str;
                    values[slot] = self.map_string(text);
                }
            }
        }
        let count = args.len().min(MAX_ARGS);
        let shape = ArgShape::new(&kinds[..count]).unwrap_or(ArgShape::EMPTY);
        (shape, values)
    }

    fn send(&mut self, record: &ContextRecord) {
        self.buf.clear();
        record.encode_into(&mut self.buf);
        if let Err(error) = self.channel.write(&self.buf) {
            self.session.fatal(error);
        }
        tracing::trace!(
            target: TARGET,
            thread = self.thread,
            opcode = record.opcode(),
            seq = record.seq(),
            "record sent"
        );
        self.await_ack(record.ack());
    }

    fn await_ack(&mut self, expected: Ack) {
        let mut bytes = [0u8; ACK_LEN];
        if let Err(error) = self.channel.read_exact(&mut bytes) {
            self.session.fatal(error);
        }
        let actual = Ack::decode(bytes);
        if actual != expected {
            self.session
                .fatal(ProtocolViolation::AckMismatch { expected, actual });
        }
    }

    fn finish(&mut self) {
        self.ensure_attached("detach");
        self.state = ContextState::Detaching;
        self.session
            .registry()
            .set_state(self.thread, ContextState::Detaching);

        let record = ContextRecord::EndOfStream {
            thread: self.thread,
            seq: self.seq.next(),
        };
        self.send(&record);
        if let Err(error) = self.channel.flush().and_then(|()| self.channel.close()) {
            self.session.fatal(error);
        }

        self.state = ContextState::Closed;
        self.session
            .registry()
            .set_state(self.thread, ContextState::Closed);
        tracing::debug!(target: TARGET, thread = self.thread, "context detached");
    }
}

impl Drop for TraceContext {
    fn drop(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }
        if thread::panicking() {
            // no handshake while unwinding: the observer sees a disconnect
            if let Err(error) = self.channel.close() {
                tracing::debug!(
                    target: TARGET,
                    thread = self.thread,
                    %error,
                    "channel close failed while unwinding"
                );
            }
            self.state = ContextState::Closed;
            self.session
                .registry()
                .set_state(self.thread, ContextState::Closed);
        } else {
            self.finish();
        }
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceContext")
            .field("session", &self.session.name())
            .field("thread", &self.thread)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
