use std::io;

use thiserror::Error;

/// Failures encountered while encoding or decoding trace records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The underlying reader or writer failed.
    #[error("trace record I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The stream ended in the middle of a record.
    #[error("trace record truncated while reading {field}")]
    Truncated {
        /// Name of the field that could not be read completely.
        field: &'static str,
    },
    /// The opcode byte is not valid on the channel it was read from.
    #[error("unknown trace opcode {0:#04x}")]
    UnknownOpcode(u8),
    /// Match bits describe an impossible argument layout.
    #[error("invalid match argument shape {0:#04x}")]
    InvalidShape(u8),
    /// An escaped command byte has no registered argument shape.
    #[error("unknown escaped command {0}")]
    UnknownCommand(u8),
    /// A command byte overlaps the escape flag or the end-of-stream marker.
    #[error("command {0:#04x} is reserved")]
    ReservedCommand(u8),
    /// The argument list does not match the layout the opcode requires.
    #[error("opcode {opcode} expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        /// Opcode whose layout was violated.
        opcode: u8,
        /// Number of arguments the layout requires.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },
    /// More than three argument slots were supplied.
    #[error("at most 3 argument slots are supported, got {0}")]
    TooManyArguments(usize),
    /// A string-table insertion carried bytes that are not UTF-8.
    #[error("string table entry is not valid UTF-8")]
    InvalidUtf8,
    /// A string is too long for the 16-bit length prefix.
    #[error("string of {0} bytes exceeds the 65535 byte limit")]
    StringTooLong(usize),
    /// A status report carried a value outside the accepted result codes.
    #[error("status code {0} is not an accepted result code")]
    InvalidStatus(u32),
    /// A record carried a sequence number other than the expected one.
    #[error("sequence mismatch: expected {expected:#04x}, got {actual:#04x}")]
    OutOfSequence {
        /// Sequence number the reader expected.
        expected: u8,
        /// Sequence number found on the wire.
        actual: u8,
    },
}

impl RecordError {
    /// Maps an I/O failure, turning an unexpected end of stream into [`RecordError::Truncated`].
    pub(crate) fn from_read(error: io::Error, field: &'static str) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated { field }
        } else {
            Self::Io(error)
        }
    }

    /// Returns `true` when the stream ended before the first byte of a record.
    ///
    /// Readers use this to tell an orderly close apart from a torn record.
    #[must_use]
    pub fn is_clean_eof(&self) -> bool {
        matches!(self, Self::Truncated { field: "opcode" })
    }
}
