//! Unix domain socket transport.

use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, Transport};

const TARGET: &str = "trace_io::unix";

/// Delay between connection attempts while the listener is not up yet.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Transport mapping channel names to socket files below a directory.
///
/// `"{session}/root"` becomes `<dir>/{session}/root`. The socket file is
/// removed once its single peer has connected.
#[derive(Clone, Debug)]
pub struct UnixTransport {
    dir: PathBuf,
    connect_timeout: Duration,
    poll_interval: Duration,
}

impl UnixTransport {
    /// Creates a transport rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how long [`Transport::connect`] keeps retrying.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the delay between connection attempts.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Socket directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the socket file backing `name`.
    #[must_use]
    pub fn socket_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn channel(name: &str, stream: UnixStream) -> Result<Channel, ChannelError> {
        let reader = stream
            .try_clone()
            .map_err(|source| ChannelError::io(name, source))?;
        Ok(Channel::new(name, reader, stream))
    }
}

impl Transport for UnixTransport {
    fn listen(&self, name: &str) -> Result<Channel, ChannelError> {
        let path = self.socket_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ChannelError::io(name, source))?;
        }

        let listener = UnixListener::bind(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::AddrInUse {
                ChannelError::AddressInUse {
                    name: name.to_owned(),
                }
            } else {
                ChannelError::io(name, source)
            }
        })?;
        tracing::debug!(target: TARGET, channel = name, path = %path.display(), "listening");

        let accepted = listener.accept();
        // the name is single-use: free it whether or not the accept succeeded
        let _ = fs::remove_file(&path);
        let (stream, _) = accepted.map_err(|source| ChannelError::io(name, source))?;
        Self::channel(name, stream)
    }

    fn connect(&self, name: &str) -> Result<Channel, ChannelError> {
        let path = self.socket_path(name);
        let deadline = Instant::now() + self.connect_timeout;
        loop {
            match UnixStream::connect(&path) {
                Ok(stream) => {
                    tracing::debug!(target: TARGET, channel = name, "connected");
                    return Self::channel(name, stream);
                }
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    if Instant::now() >= deadline {
                        return Err(ChannelError::ConnectTimeout {
                            name: name.to_owned(),
                            timeout: self.connect_timeout,
                        });
                    }
                    thread::sleep(self.poll_interval);
                }
                Err(source) => return Err(ChannelError::io(name, source)),
            }
        }
    }
}
