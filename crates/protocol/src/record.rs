//! Tagged trace records and their little-endian wire encoding.

use std::io::Read;

use crate::command::{CommandSpec, CommandTable, validate_command};
use crate::error::RecordError;
use crate::opcode::{
    ArgShape, END_OF_STREAM, END_OF_STREAM_KEY, INIT_TRACE, LifecycleLayout, LifecycleOp,
    MATCH_ESCAPE, MAX_ARGS, STRING_MAP,
};

/// Encoded size of an [`Ack`].
pub const ACK_LEN: usize = 5;

/// Longest string a string-table insertion can carry.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Up to three 32-bit argument words.
///
/// String arguments are stored as their interned keys, so every slot is a
/// plain integer once a record is built.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Arguments {
    values: [u32; MAX_ARGS],
    len: u8,
}

impl Arguments {
    /// No arguments.
    pub const EMPTY: Self = Self {
        values: [0; MAX_ARGS],
        len: 0,
    };

    /// Copies up to three argument words.
    pub fn new(values: &[u32]) -> Result<Self, RecordError> {
        if values.len() > MAX_ARGS {
            return Err(RecordError::TooManyArguments(values.len()));
        }
        let mut args = Self::EMPTY;
        args.values[..values.len()].copy_from_slice(values);
        args.len = values.len() as u8;
        Ok(args)
    }

    /// The argument words in slot order.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.values[..self.len()]
    }

    /// Number of argument words.
    #[must_use]
    #[inline]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns `true` when no argument is present.
    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// XOR of every argument word.
    ///
    /// This is the acknowledgment key. It has no positional separation, so
    /// distinct tuples such as `(a, b)` and `(b, a)` share a key; it only
    /// guards against accidental desynchronisation.
    #[must_use]
    pub fn ack_key(&self) -> u32 {
        self.as_slice().iter().fold(0, |key, value| key ^ value)
    }

    fn read_from<R: Read + ?Sized>(
        reader: &mut R,
        count: usize,
        field: &'static str,
    ) -> Result<Self, RecordError> {
        if count > MAX_ARGS {
            return Err(RecordError::TooManyArguments(count));
        }
        let mut args = Self::EMPTY;
        for slot in 0..count {
            args.values[slot] = read_u32(reader, field)?;
        }
        args.len = count as u8;
        Ok(args)
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        for value in self.as_slice() {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Acknowledgment written by the observer for every acknowledged record.
///
/// Layout: `opcode(1) · key(4)`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Ack {
    /// Opcode of the acknowledged record.
    pub opcode: u8,
    /// XOR of the acknowledged record's argument words.
    pub key: u32,
}

impl Ack {
    /// Creates an acknowledgment.
    #[must_use]
    pub const fn new(opcode: u8, key: u32) -> Self {
        Self { opcode, key }
    }

    /// The acknowledgment of an end-of-stream record.
    #[must_use]
    pub const fn end_of_stream() -> Self {
        Self::new(END_OF_STREAM, END_OF_STREAM_KEY)
    }

    /// Encodes the acknowledgment into its five wire bytes.
    #[must_use]
    pub const fn encode(self) -> [u8; ACK_LEN] {
        let key = self.key.to_le_bytes();
        [self.opcode, key[0], key[1], key[2], key[3]]
    }

    /// Decodes the five wire bytes of an acknowledgment.
    #[must_use]
    pub const fn decode(bytes: [u8; ACK_LEN]) -> Self {
        Self::new(
            bytes[0],
            u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
        )
    }

    /// Reads one acknowledgment from `reader`.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self, RecordError> {
        let mut bytes = [0u8; ACK_LEN];
        reader
            .read_exact(&mut bytes)
            .map_err(|error| RecordError::from_read(error, "ack"))?;
        Ok(Self::decode(bytes))
    }
}

/// Records written on a thread's own channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContextRecord {
    /// Ad-hoc assertion whose opcode is the match bit pattern of `shape`.
    ///
    /// Layout: `bits(1) · args(4 each) · seq(1)`.
    Match {
        /// Kinds of the argument slots.
        shape: ArgShape,
        /// Argument words; string slots hold interned keys.
        args: Arguments,
        /// Rolling sequence number.
        seq: u8,
    },
    /// Caller-defined command escaped with [`MATCH_ESCAPE`].
    ///
    /// Layout: `0x80|cmd(1) · [handle(4)] · args(4 each) · seq(1)`.
    Command {
        /// Command byte without the escape bit.
        cmd: u8,
        /// Object handle, present when the command layout declares one.
        handle: Option<u32>,
        /// Keyed argument words.
        args: Arguments,
        /// Rolling sequence number.
        seq: u8,
    },
    /// Final record of a detaching thread.
    ///
    /// Layout: `0xFF · thread(4) · seq(1)`.
    EndOfStream {
        /// Identifier of the detaching thread.
        thread: u32,
        /// Rolling sequence number.
        seq: u8,
    },
}

impl ContextRecord {
    /// Builds a match record, checking the argument count against `shape`.
    pub fn matching(shape: ArgShape, args: &[u32], seq: u8) -> Result<Self, RecordError> {
        if shape.is_empty() || shape.len() != args.len() {
            return Err(RecordError::ArgumentCount {
                opcode: shape.bits(),
                expected: shape.len().max(1),
                actual: args.len(),
            });
        }
        Ok(Self::Match {
            shape,
            args: Arguments::new(args)?,
            seq,
        })
    }

    /// Builds an escaped command record.
    pub fn command(
        cmd: u8,
        handle: Option<u32>,
        args: &[u32],
        seq: u8,
    ) -> Result<Self, RecordError> {
        validate_command(cmd)?;
        Ok(Self::Command {
            cmd,
            handle,
            args: Arguments::new(args)?,
            seq,
        })
    }

    /// Opcode byte written first on the wire.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Match { shape, .. } => shape.bits(),
            Self::Command { cmd, .. } => MATCH_ESCAPE | cmd,
            Self::EndOfStream { .. } => END_OF_STREAM,
        }
    }

    /// Rolling sequence number of the record.
    #[must_use]
    pub const fn seq(&self) -> u8 {
        match self {
            Self::Match { seq, .. } | Self::Command { seq, .. } | Self::EndOfStream { seq, .. } => {
                *seq
            }
        }
    }

    /// The acknowledgment the observer must answer this record with.
    #[must_use]
    pub fn ack(&self) -> Ack {
        match self {
            Self::Match { args, .. } | Self::Command { args, .. } => {
                Ack::new(self.opcode(), args.ack_key())
            }
            Self::EndOfStream { .. } => Ack::end_of_stream(),
        }
    }

    /// Appends the encoded record to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode());
        match self {
            Self::Match { args, .. } => args.encode_into(out),
            Self::Command { handle, args, .. } => {
                if let Some(handle) = handle {
                    out.extend_from_slice(&handle.to_le_bytes());
                }
                args.encode_into(out);
            }
            Self::EndOfStream { thread, .. } => out.extend_from_slice(&thread.to_le_bytes()),
        }
        out.push(self.seq());
    }

    /// Encodes the record into a new buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 4 * (MAX_ARGS + 1));
        self.encode_into(&mut out);
        out
    }

    /// Reads one record, consulting `commands` for the layout of escaped commands.
    pub fn read_from<R: Read + ?Sized>(
        reader: &mut R,
        commands: &CommandTable,
    ) -> Result<Self, RecordError> {
        let opcode = read_u8(reader, "opcode")?;
        let record = if opcode == END_OF_STREAM {
            let thread = read_u32(reader, "thread")?;
            Self::EndOfStream {
                thread,
                seq: read_u8(reader, "seq")?,
            }
        } else if opcode & MATCH_ESCAPE != 0 {
            let cmd = opcode & !MATCH_ESCAPE;
            let CommandSpec { shape, handle } = commands.require(cmd)?;
            let handle = if handle {
                Some(read_u32(reader, "handle")?)
            } else {
                None
            };
            let args = Arguments::read_from(reader, shape.len(), "argument")?;
            Self::Command {
                cmd,
                handle,
                args,
                seq: read_u8(reader, "seq")?,
            }
        } else {
            let shape = ArgShape::from_bits(opcode)?;
            let args = Arguments::read_from(reader, shape.len(), "argument")?;
            Self::Match {
                shape,
                args,
                seq: read_u8(reader, "seq")?,
            }
        };
        Ok(record)
    }
}

/// A primitive-lifecycle record written on the root channel.
///
/// The layout after `opcode(1) · thread(4)` is chosen by
/// [`LifecycleOp::layout`]; `seq(1)` always comes last.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LifecycleRecord {
    op: LifecycleOp,
    thread: u32,
    handle: Option<u32>,
    args: Arguments,
    seq: u8,
}

impl LifecycleRecord {
    /// Builds a record, checking `handle` and `args` against the layout of `op`.
    pub fn new(
        op: LifecycleOp,
        thread: u32,
        handle: Option<u32>,
        args: &[u32],
        seq: u8,
    ) -> Result<Self, RecordError> {
        let (needs_handle, arg_count) = match op.layout() {
            LifecycleLayout::OneArg => (false, 1),
            LifecycleLayout::TwoArgs => (false, 2),
            LifecycleLayout::Object => (true, 1),
            LifecycleLayout::ObjectWithValue => (true, 2),
        };
        if needs_handle != handle.is_some() || arg_count != args.len() {
            return Err(RecordError::ArgumentCount {
                opcode: op.as_u8(),
                expected: arg_count + usize::from(needs_handle),
                actual: args.len() + usize::from(handle.is_some()),
            });
        }
        Ok(Self {
            op,
            thread,
            handle,
            args: Arguments::new(args)?,
            seq,
        })
    }

    /// Lifecycle operation.
    #[must_use]
    pub const fn op(&self) -> LifecycleOp {
        self.op
    }

    /// Identifier of the thread that issued the record.
    #[must_use]
    pub const fn thread(&self) -> u32 {
        self.thread
    }

    /// Object handle for object operations.
    #[must_use]
    pub const fn handle(&self) -> Option<u32> {
        self.handle
    }

    /// Argument words; the first one is the label key for object and status records.
    #[must_use]
    pub fn args(&self) -> &[u32] {
        self.args.as_slice()
    }

    /// Rolling sequence number of the root channel.
    #[must_use]
    pub const fn seq(&self) -> u8 {
        self.seq
    }

    /// The acknowledgment expected on the issuing thread's channel.
    ///
    /// Only meaningful when [`LifecycleOp::is_acknowledged`] holds.
    #[must_use]
    pub fn ack(&self) -> Ack {
        Ack::new(self.op.as_u8(), self.args.ack_key())
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.op.as_u8());
        out.extend_from_slice(&self.thread.to_le_bytes());
        if let Some(handle) = self.handle {
            out.extend_from_slice(&handle.to_le_bytes());
        }
        self.args.encode_into(out);
        out.push(self.seq);
    }

    fn read_body<R: Read + ?Sized>(reader: &mut R, op: LifecycleOp) -> Result<Self, RecordError> {
        let thread = read_u32(reader, "thread")?;
        let (handle, arg_count) = match op.layout() {
            LifecycleLayout::OneArg => (None, 1),
            LifecycleLayout::TwoArgs => (None, 2),
            LifecycleLayout::Object => (Some(read_u32(reader, "handle")?), 1),
            LifecycleLayout::ObjectWithValue => (Some(read_u32(reader, "handle")?), 2),
        };
        let args = Arguments::read_from(reader, arg_count, "argument")?;
        Ok(Self {
            op,
            thread,
            handle,
            args,
            seq: read_u8(reader, "seq")?,
        })
    }
}

/// Records written on the session's root channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RootRecord {
    /// First record of a session. Layout: `10 · thread(4) · seq(1)`.
    Init {
        /// Identifier of the thread that started the session.
        thread: u32,
        /// Rolling sequence number.
        seq: u8,
    },
    /// String-table insertion. Layout: `11 · len(2) · utf8(len)`.
    ///
    /// Keys are implicit: the n-th insertion of a session receives key n.
    StringMap {
        /// Interned text.
        text: String,
    },
    /// Primitive lifecycle event.
    Lifecycle(LifecycleRecord),
}

impl RootRecord {
    /// Builds a string-table insertion, rejecting strings over [`MAX_STRING_LEN`] bytes.
    pub fn string_map(text: impl Into<String>) -> Result<Self, RecordError> {
        let text = text.into();
        if text.len() > MAX_STRING_LEN {
            return Err(RecordError::StringTooLong(text.len()));
        }
        Ok(Self::StringMap { text })
    }

    /// Opcode byte written first on the wire.
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        match self {
            Self::Init { .. } => INIT_TRACE,
            Self::StringMap { .. } => STRING_MAP,
            Self::Lifecycle(record) => record.op.as_u8(),
        }
    }

    /// Appends the encoded record to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RecordError> {
        match self {
            Self::Init { thread, seq } => {
                out.push(INIT_TRACE);
                out.extend_from_slice(&thread.to_le_bytes());
                out.push(*seq);
            }
            Self::StringMap { text } => {
                let len = u16::try_from(text.len())
                    .map_err(|_| RecordError::StringTooLong(text.len()))?;
                out.push(STRING_MAP);
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(text.as_bytes());
            }
            Self::Lifecycle(record) => record.encode_into(out),
        }
        Ok(())
    }

    /// Encodes the record into a new buffer.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Reads one root-channel record.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self, RecordError> {
        let opcode = read_u8(reader, "opcode")?;
        match opcode {
            INIT_TRACE => {
                let thread = read_u32(reader, "thread")?;
                Ok(Self::Init {
                    thread,
                    seq: read_u8(reader, "seq")?,
                })
            }
            STRING_MAP => {
                let len = read_u16(reader, "string length")?;
                let mut bytes = vec![0u8; usize::from(len)];
                reader
                    .read_exact(&mut bytes)
                    .map_err(|error| RecordError::from_read(error, "string"))?;
                let text = String::from_utf8(bytes).map_err(|_| RecordError::InvalidUtf8)?;
                Ok(Self::StringMap { text })
            }
            other => {
                let op = LifecycleOp::try_from(other)?;
                LifecycleRecord::read_body(reader, op).map(Self::Lifecycle)
            }
        }
    }
}

fn read_u8<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<u8, RecordError> {
    let mut byte = [0u8; 1];
    reader
        .read_exact(&mut byte)
        .map_err(|error| RecordError::from_read(error, field))?;
    Ok(byte[0])
}

fn read_u16<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<u16, RecordError> {
    let mut bytes = [0u8; 2];
    reader
        .read_exact(&mut bytes)
        .map_err(|error| RecordError::from_read(error, field))?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<u32, RecordError> {
    let mut bytes = [0u8; 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|error| RecordError::from_read(error, field))?;
    Ok(u32::from_le_bytes(bytes))
}
