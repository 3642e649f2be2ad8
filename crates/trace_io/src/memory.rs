//! In-process transport built on `crossbeam-channel` byte pipes.

use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use rustc_hash::FxHashMap;

use crate::channel::{BoxedReader, BoxedWriter, Channel};
use crate::error::ChannelError;
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, Transport};

const TARGET: &str = "trace_io::memory";

type Halves = (BoxedReader, BoxedWriter);

#[derive(Debug, Default)]
struct Registry {
    listeners: Mutex<FxHashMap<String, Sender<Halves>>>,
    changed: Condvar,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, FxHashMap<String, Sender<Halves>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transport whose channels live entirely inside the current process.
///
/// Clones share one rendezvous registry, so a traced session and an
/// observer running on different threads can meet by name.
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    registry: Arc<Registry>,
    connect_timeout: Duration,
}

impl MemoryTransport {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets how long [`Transport::connect`] waits for a listener.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn listen(&self, name: &str) -> Result<Channel, ChannelError> {
        let (deliver, delivered) = crossbeam_channel::bounded::<Halves>(1);
        {
            let mut listeners = self.registry.lock();
            if listeners.contains_key(name) {
                return Err(ChannelError::AddressInUse {
                    name: name.to_owned(),
                });
            }
            listeners.insert(name.to_owned(), deliver);
        }
        self.registry.changed.notify_all();
        tracing::debug!(target: TARGET, channel = name, "listening");

        let (reader, writer) = delivered.recv().map_err(|_| ChannelError::Disconnected {
            name: name.to_owned(),
        })?;
        Ok(Channel::from_boxed(name.to_owned(), reader, writer))
    }

    fn connect(&self, name: &str) -> Result<Channel, ChannelError> {
        let deadline = Instant::now() + self.connect_timeout;
        let mut listeners = self.registry.lock();
        loop {
            if let Some(deliver) = listeners.remove(name) {
                drop(listeners);
                let (to_listener, from_connector) = pipe();
                let (to_connector, from_listener) = pipe();
                deliver
                    .send((Box::new(from_connector), Box::new(to_connector)))
                    .map_err(|_| ChannelError::Disconnected {
                        name: name.to_owned(),
                    })?;
                tracing::debug!(target: TARGET, channel = name, "connected");
                return Ok(Channel::new(name, from_listener, to_listener));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ChannelError::ConnectTimeout {
                    name: name.to_owned(),
                    timeout: self.connect_timeout,
                });
            }
            listeners = self
                .registry
                .changed
                .wait_timeout(listeners, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            pending: Vec::new(),
            offset: 0,
        },
    )
}

/// Receiving end of a one-way in-memory pipe.
#[derive(Debug)]
struct PipeReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.offset == self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                // writer dropped: end of stream
                Err(_) => return Ok(0),
            }
        }
        let available = &self.pending[self.offset..];
        let len = available.len().min(buf.len());
        buf[..len].copy_from_slice(&available[..len]);
        self.offset += len;
        Ok(len)
    }
}

/// Sending end of a one-way in-memory pipe.
#[derive(Debug)]
struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn pipe_preserves_order_across_chunks() {
        let (mut writer, mut reader) = pipe();
        writer.write_all(b"hel").expect("write");
        writer.write_all(b"lo").expect("write");
        drop(writer);
        let mut text = String::new();
        reader.read_to_string(&mut text).expect("read");
        assert_eq!(text, "hello");
    }

    #[test]
    fn write_after_reader_drop_is_broken_pipe() {
        let (mut writer, reader) = pipe();
        drop(reader);
        let error = writer.write(b"x").unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn listen_and_connect_pair_up() {
        let transport = MemoryTransport::new();
        let listener = {
            let transport = transport.clone();
            thread::spawn(move || {
                let mut channel = transport.listen("s/root").expect("listen");
                channel.write(b"ping").expect("write");
                let mut reply = [0u8; 4];
                channel.read_exact(&mut reply).expect("reply");
                reply
            })
        };

        let mut peer = transport.connect("s/root").expect("connect");
        let mut ping = [0u8; 4];
        peer.read_exact(&mut ping).expect("ping");
        assert_eq!(&ping, b"ping");
        peer.write(b"pong").expect("pong");
        assert_eq!(&listener.join().expect("listener thread"), b"pong");
    }

    #[test]
    fn connect_times_out_without_listener() {
        let transport = MemoryTransport::new().with_connect_timeout(Duration::from_millis(20));
        let error = transport.connect("missing").unwrap_err();
        assert!(matches!(error, ChannelError::ConnectTimeout { .. }));
    }

    #[test]
    fn second_listener_on_same_name_fails() {
        let transport = MemoryTransport::new();
        let first = {
            let transport = transport.clone();
            thread::spawn(move || transport.listen("dup").map(|_| ()))
        };

        // wait until the first listener is registered
        let deadline = Instant::now() + Duration::from_secs(5);
        while !transport.registry.lock().contains_key("dup") {
            assert!(Instant::now() < deadline, "listener never registered");
            thread::yield_now();
        }

        assert!(matches!(
            transport.listen("dup"),
            Err(ChannelError::AddressInUse { .. })
        ));
        let _peer = transport.connect("dup").expect("connect");
        first.join().expect("listener").expect("first listener");
    }

    #[test]
    fn closing_one_side_ends_the_other() {
        let transport = MemoryTransport::new();
        let listener = {
            let transport = transport.clone();
            thread::spawn(move || {
                let mut channel = transport.listen("eof").expect("listen");
                channel.close().expect("close");
            })
        };
        let mut peer = transport.connect("eof").expect("connect");
        listener.join().expect("listener");
        let error = peer.read_exact(&mut [0u8; 1]).unwrap_err();
        assert!(error.is_disconnect());
    }
}
