#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! Wire format of the synchronisation-tracing protocol.
//!
//! A traced process talks to an external observer over one root channel and
//! one channel per attached thread. Every record is a fixed, byte-packed,
//! little-endian layout selected by its first byte:
//!
//! - the root channel carries [`RootRecord`]s: the session `INIT_TRACE`
//!   record, `STRING_MAP` insertions that grow the shared string table, and
//!   primitive [`LifecycleRecord`]s issued on behalf of another thread;
//! - a thread channel carries [`ContextRecord`]s: match records whose opcode
//!   encodes the kinds of up to three argument slots, escaped commands whose
//!   layout comes from a [`CommandTable`], and the final end-of-stream
//!   record;
//! - the observer answers each acknowledged record with a five-byte [`Ack`]
//!   on the issuing thread's channel.
//!
//! # Invariants
//!
//! - Match shapes are contiguous from slot 1 and never mark a slot as both
//!   integer and string.
//! - Command bytes never carry the escape bit, and `0x7F` is unavailable
//!   because it would escape to the end-of-stream opcode.
//! - The acknowledgment key is the XOR of the keyed argument words. Object
//!   handles are excluded. The key is not collision-free and only detects
//!   accidental desynchronisation.
//! - Every endpoint numbers its records with a [`SequenceCounter`] that
//!   starts at `0xAB` and wraps.
//!
//! # Examples
//!
//! ```
//! use trace_protocol::{Ack, ArgKind, ArgShape, CommandTable, ContextRecord};
//!
//! let shape = ArgShape::new(&[ArgKind::Str, ArgKind::Int]).expect("two slots");
//! let record = ContextRecord::matching(shape, &[1, 42], 0xAB).expect("matching arity");
//! assert_eq!(record.ack(), Ack::new(0x06, 1 ^ 42));
//!
//! let bytes = record.encode();
//! let decoded = ContextRecord::read_from(&mut &bytes[..], &CommandTable::builtin())
//!     .expect("well-formed record");
//! assert_eq!(decoded, record);
//! ```

mod command;
mod error;
mod opcode;
mod record;
mod sequence;
mod status;

pub use command::{CommandSpec, CommandTable, validate_command};
pub use error::RecordError;
pub use opcode::{
    ArgKind, ArgShape, END_OF_STREAM, END_OF_STREAM_KEY, INIT_TRACE, LifecycleLayout, LifecycleOp,
    MATCH_ESCAPE, MATCH_INT_1, MATCH_INT_2, MATCH_INT_3, MATCH_STR_1, MATCH_STR_2, MATCH_STR_3,
    MAX_ARGS, OBJECT_CTOR, OBJECT_DTOR, OBJECT_WAIT1, OBJECT_WAIT2, STATUS_CODE, STRING_MAP,
    THREAD_CTOR, THREAD_DTOR, THREAD_WAIT,
};
pub use record::{
    ACK_LEN, Ack, Arguments, ContextRecord, LifecycleRecord, MAX_STRING_LEN, RootRecord,
};
pub use sequence::{SEQUENCE_SEED, SequenceCounter};
pub use status::StatusCode;
