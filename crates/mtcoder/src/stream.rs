use std::io;

use crate::error::SzError;

/// Sequential byte source shared by the workers of a ring.
///
/// A read may return fewer bytes than requested; `Ok(0)` means the source is
/// exhausted.
pub trait SeqInStream {
    /// Reads up to `buf.len()` bytes.
    ///
    /// # Errors
    ///
    /// [`SzError::Read`] when the underlying source fails.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SzError>;
}

impl<R: io::Read + ?Sized> SeqInStream for R {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SzError> {
        loop {
            match io::Read::read(self, buf) {
                Ok(read) => return Ok(read),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    tracing::debug!(target: "mtcoder::stream", %error, "input stream failed");
                    return Err(SzError::Read);
                }
            }
        }
    }
}

/// Sequential byte sink shared by the workers of a ring.
///
/// Returns how many bytes were accepted; anything short of `buf.len()` is a
/// write failure.
pub trait SeqOutStream {
    /// Writes `buf`.
    fn write(&mut self, buf: &[u8]) -> usize;
}

impl<W: io::Write + ?Sized> SeqOutStream for W {
    fn write(&mut self, buf: &[u8]) -> usize {
        let mut written = 0;
        while written < buf.len() {
            match io::Write::write(self, &buf[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    tracing::debug!(target: "mtcoder::stream", %error, written, "output stream failed");
                    break;
                }
            }
        }
        written
    }
}

/// Fills `buf` from `input`, stopping early only when the source is
/// exhausted.
pub(crate) fn read_full<I: SeqInStream + ?Sized>(
    input: &mut I,
    buf: &mut [u8],
) -> Result<usize, SzError> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = input.read(&mut buf[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Trickle<'a>(&'a [u8]);

    impl io::Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.0.len().min(buf.len()).min(3);
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    struct Broken;

    impl io::Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("gone"))
        }
    }

    #[test]
    fn read_full_retries_partial_reads() {
        let mut input = Trickle(b"abcdefghij");
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut input, &mut buf), Ok(8));
        assert_eq!(&buf, b"abcdefgh");
        assert_eq!(read_full(&mut input, &mut buf), Ok(2));
        assert_eq!(read_full(&mut input, &mut buf), Ok(0));
    }

    #[test]
    fn io_errors_become_read_errors() {
        let mut buf = [0u8; 4];
        assert_eq!(read_full(&mut Broken, &mut buf), Err(SzError::Read));
    }

    #[test]
    fn full_slice_writer_reports_short_write() {
        let mut storage = [0u8; 4];
        let mut sink = io::Cursor::new(&mut storage[..]);
        assert_eq!(SeqOutStream::write(&mut sink, b"abcdef"), 4);
        assert_eq!(&storage, b"abcd");
    }

    #[test]
    fn vec_writer_accepts_everything() {
        let mut sink = Vec::new();
        assert_eq!(SeqOutStream::write(&mut sink, b"abc"), 3);
        assert_eq!(sink, b"abc");
    }
}
