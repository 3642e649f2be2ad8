use std::fmt;
use std::time::Duration;

use crate::channel::Channel;
use crate::error::ChannelError;

/// Default time a connecting peer waits for the listener to appear.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Rendezvous mechanism that pairs a listening endpoint with one peer.
///
/// The traced process listens; the observer connects.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Creates the endpoint `name` and blocks until exactly one peer connects.
    ///
    /// Fails with [`ChannelError::AddressInUse`] when another listener is
    /// already waiting on the same name.
    fn listen(&self, name: &str) -> Result<Channel, ChannelError>;

    /// Connects to the endpoint `name`, retrying until a listener appears or
    /// the transport's connect timeout elapses.
    fn connect(&self, name: &str) -> Result<Channel, ChannelError>;
}

/// Name of the root channel of `session`.
#[must_use]
pub fn root_channel_name(session: &str) -> String {
    format!("{session}/root")
}

/// Name of the channel owned by `thread` within `session`.
#[must_use]
pub fn thread_channel_name(session: &str, thread: u32) -> String {
    format!("{session}/{thread:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_follow_session_prefix() {
        assert_eq!(root_channel_name("run-1"), "run-1/root");
        assert_eq!(thread_channel_name("run-1", 0xAB), "run-1/000000ab");
    }
}
