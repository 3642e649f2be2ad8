use std::fmt;
use std::io::{Read, Write};

use crate::error::ChannelError;

/// Reading half of a duplex stream.
pub type BoxedReader = Box<dyn Read + Send>;
/// Writing half of a duplex stream.
pub type BoxedWriter = Box<dyn Write + Send>;

/// A named, ordered, reliable duplex byte stream between two processes.
///
/// Reads loop until the requested number of bytes has arrived; a peer that
/// disconnects mid-read surfaces as [`ChannelError::Disconnected`]. Closing
/// flushes and drops both halves so the peer observes end of stream.
pub struct Channel {
    name: String,
    reader: Option<BoxedReader>,
    writer: Option<BoxedWriter>,
}

impl Channel {
    /// Wraps the two halves of an established connection.
    pub fn new(
        name: impl Into<String>,
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Self {
        Self::from_boxed(name.into(), Box::new(reader), Box::new(writer))
    }

    pub(crate) fn from_boxed(name: String, reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            name,
            reader: Some(reader),
            writer: Some(writer),
        }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once [`Channel::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }

    /// Writes every byte of `bytes`.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        let name = &self.name;
        let writer = self.writer.as_mut().ok_or_else(|| ChannelError::Closed {
            name: name.clone(),
        })?;
        writer
            .write_all(bytes)
            .map_err(|source| ChannelError::io(name, source))
    }

    /// Reads exactly `buf.len()` bytes.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ChannelError> {
        let name = &self.name;
        let reader = self.reader.as_mut().ok_or_else(|| ChannelError::Closed {
            name: name.clone(),
        })?;
        reader
            .read_exact(buf)
            .map_err(|source| ChannelError::io(name, source))
    }

    /// Borrows the reading half, for decoders that pull bytes themselves.
    pub fn reader(&mut self) -> Result<&mut (dyn Read + Send), ChannelError> {
        match self.reader.as_mut() {
            Some(reader) => Ok(reader.as_mut()),
            None => Err(ChannelError::Closed {
                name: self.name.clone(),
            }),
        }
    }

    /// Flushes buffered output.
    pub fn flush(&mut self) -> Result<(), ChannelError> {
        let name = &self.name;
        let writer = self.writer.as_mut().ok_or_else(|| ChannelError::Closed {
            name: name.clone(),
        })?;
        writer.flush().map_err(|source| ChannelError::io(name, source))
    }

    /// Flushes and releases both halves.
    ///
    /// A second call fails with [`ChannelError::AlreadyClosed`].
    pub fn close(&mut self) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::AlreadyClosed {
                name: self.name.clone(),
            });
        }
        let flushed = match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        };
        self.reader = None;
        self.writer = None;
        flushed.map_err(|source| ChannelError::io(&self.name, source))
    }

    /// Splits an open channel into independently owned halves.
    pub fn into_split(self) -> Result<(ChannelReader, ChannelWriter), ChannelError> {
        match (self.reader, self.writer) {
            (Some(reader), Some(writer)) => Ok((
                ChannelReader {
                    name: self.name.clone(),
                    inner: reader,
                },
                ChannelWriter {
                    name: self.name,
                    inner: writer,
                },
            )),
            _ => Err(ChannelError::Closed { name: self.name }),
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Reading half produced by [`Channel::into_split`].
pub struct ChannelReader {
    name: String,
    inner: BoxedReader,
}

impl ChannelReader {
    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads exactly `buf.len()` bytes.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ChannelError> {
        self.inner
            .read_exact(buf)
            .map_err(|source| ChannelError::io(&self.name, source))
    }

    /// Borrows the underlying reader.
    pub fn reader(&mut self) -> &mut (dyn Read + Send) {
        self.inner.as_mut()
    }
}

impl fmt::Debug for ChannelReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelReader")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Writing half produced by [`Channel::into_split`].
pub struct ChannelWriter {
    name: String,
    inner: BoxedWriter,
}

impl ChannelWriter {
    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes and flushes every byte of `bytes`.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.inner
            .write_all(bytes)
            .and_then(|()| self.inner.flush())
            .map_err(|source| ChannelError::io(&self.name, source))
    }
}

impl fmt::Debug for ChannelWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelWriter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("sink lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Reader that hands out one byte per call.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn read_exact_loops_over_partial_reads() {
        let mut channel = Channel::new(
            "t",
            Trickle(Cursor::new(vec![1, 2, 3, 4, 5])),
            io::sink(),
        );
        let mut buf = [0u8; 5];
        channel.read_exact(&mut buf).expect("five bytes");
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn short_stream_is_a_disconnect() {
        let mut channel = Channel::new("t", Cursor::new(vec![1, 2]), io::sink());
        let mut buf = [0u8; 3];
        let error = channel.read_exact(&mut buf).unwrap_err();
        assert!(error.is_disconnect());
    }

    #[test]
    fn writes_reach_the_writer() {
        let sink = SharedSink::default();
        let mut channel = Channel::new("t", io::empty(), sink.clone());
        channel.write(b"abc").expect("write");
        channel.flush().expect("flush");
        assert_eq!(&*sink.0.lock().expect("sink lock"), b"abc");
    }

    #[test]
    fn second_close_fails() {
        let mut channel = Channel::new("t", io::empty(), io::sink());
        channel.close().expect("first close");
        assert!(channel.is_closed());
        assert!(matches!(
            channel.close(),
            Err(ChannelError::AlreadyClosed { .. })
        ));
    }

    #[test]
    fn use_after_close_fails() {
        let mut channel = Channel::new("t", io::empty(), io::sink());
        channel.close().expect("close");
        assert!(matches!(channel.write(b"x"), Err(ChannelError::Closed { .. })));
        assert!(matches!(
            channel.read_exact(&mut [0u8; 1]),
            Err(ChannelError::Closed { .. })
        ));
        assert!(channel.reader().is_err());
        assert!(channel.into_split().is_err());
    }

    #[test]
    fn split_halves_keep_the_name() {
        let channel = Channel::new("s/0000000a", Cursor::new(vec![9]), io::sink());
        let (mut reader, mut writer) = channel.into_split().expect("open channel");
        assert_eq!(reader.name(), "s/0000000a");
        assert_eq!(writer.name(), "s/0000000a");
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).expect("one byte");
        assert_eq!(byte, [9]);
        writer.write(b"ok").expect("write");
    }
}
