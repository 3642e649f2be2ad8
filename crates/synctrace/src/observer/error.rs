use std::io;
use std::time::Duration;

use thiserror::Error;
use trace_io::ChannelError;
use trace_protocol::RecordError;

/// Failure detected by the [`Observer`](super::Observer).
#[derive(Debug, Error)]
pub enum ObserverError {
    /// A channel could not be connected or failed mid-stream.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// A channel delivered bytes that do not decode, or a record out of sequence.
    #[error("channel '{channel}': {source}")]
    Record {
        /// Channel the record was read from.
        channel: String,
        /// Decoding failure.
        #[source]
        source: RecordError,
    },
    /// The root channel did not start with the init record.
    #[error("root channel '{channel}' did not start with an init record (opcode {opcode})")]
    MissingInit {
        /// Root channel name.
        channel: String,
        /// Opcode received instead.
        opcode: u8,
    },
    /// A record arrived on a channel where it is not allowed.
    #[error("unexpected record with opcode {opcode} on channel '{channel}'")]
    UnexpectedRecord {
        /// Channel the record was read from.
        channel: String,
        /// Offending opcode.
        opcode: u8,
    },
    /// A string key never appeared in the mirrored string table.
    #[error("string key {key} was not mapped within {timeout:?}")]
    UnknownString {
        /// Unresolved key.
        key: u32,
        /// How long the reader waited.
        timeout: Duration,
    },
    /// A root record names a thread whose channel never connected.
    #[error("thread {thread} has no connected channel")]
    UnknownThread {
        /// Thread identifier from the record.
        thread: u32,
    },
    /// A thread was announced twice.
    #[error("thread {thread} was announced twice")]
    DuplicateThread {
        /// Thread identifier from the record.
        thread: u32,
    },
    /// A thread channel ended without the end-of-stream handshake.
    #[error("thread {thread} disconnected before detaching")]
    Disconnected {
        /// Thread identifier of the channel.
        thread: u32,
    },
    /// A reader thread could not be spawned.
    #[error("failed to spawn observer reader thread: {0}")]
    Spawn(#[source] io::Error),
    /// A reader thread panicked.
    #[error("observer reader thread panicked")]
    ThreadPanicked,
}

impl ObserverError {
    pub(crate) fn record(channel: &str, source: RecordError) -> Self {
        Self::Record {
            channel: channel.to_owned(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_errors_name_the_channel() {
        let error = ObserverError::record(
            "s/root",
            RecordError::OutOfSequence {
                expected: 0xAB,
                actual: 0xAC,
            },
        );
        assert!(error.to_string().starts_with("channel 's/root': "));
    }
}
