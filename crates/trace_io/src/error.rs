use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failures raised by a [`Channel`](crate::Channel) or a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
pub enum ChannelError {
    /// An operation was attempted after [`Channel::close`](crate::Channel::close).
    #[error("channel '{name}' is closed")]
    Closed {
        /// Channel name.
        name: String,
    },
    /// [`Channel::close`](crate::Channel::close) was called twice.
    #[error("channel '{name}' was already closed")]
    AlreadyClosed {
        /// Channel name.
        name: String,
    },
    /// The peer closed its end before the requested bytes arrived.
    #[error("peer of channel '{name}' disconnected")]
    Disconnected {
        /// Channel name.
        name: String,
    },
    /// Another listener already owns the name.
    #[error("channel '{name}' already has a listener")]
    AddressInUse {
        /// Channel name.
        name: String,
    },
    /// No listener appeared before the connect timeout elapsed.
    #[error("no listener for channel '{name}' after {timeout:?}")]
    ConnectTimeout {
        /// Channel name.
        name: String,
        /// Configured timeout.
        timeout: Duration,
    },
    /// The underlying stream failed.
    #[error("I/O error on channel '{name}': {source}")]
    Io {
        /// Channel name.
        name: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ChannelError {
    pub(crate) fn io(name: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            Self::Disconnected {
                name: name.to_owned(),
            }
        } else {
            Self::Io {
                name: name.to_owned(),
                source,
            }
        }
    }

    /// Name of the channel the error belongs to.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        match self {
            Self::Closed { name }
            | Self::AlreadyClosed { name }
            | Self::Disconnected { name }
            | Self::AddressInUse { name }
            | Self::ConnectTimeout { name, .. }
            | Self::Io { name, .. } => name,
        }
    }

    /// Returns `true` when the peer went away; readers treat this as end of stream.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_becomes_disconnected() {
        let error = ChannelError::io("s/root", io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(error.is_disconnect());
        assert_eq!(error.channel_name(), "s/root");
    }

    #[test]
    fn other_errors_keep_their_source() {
        let error = ChannelError::io("s/root", io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(!error.is_disconnect());
        assert!(error.to_string().starts_with("I/O error on channel 's/root'"));
    }
}
