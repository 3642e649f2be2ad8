#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! Named duplex byte channels between a traced process and its observer.
//!
//! # Overview
//!
//! A [`Channel`] is an ordered, reliable byte stream with exact-length
//! reads. Channels are created through a [`Transport`]: the traced side
//! calls [`Transport::listen`] and blocks until exactly one peer has
//! connected; the observer calls [`Transport::connect`], which retries until
//! the listener shows up or a timeout expires.
//!
//! Two transports are provided:
//!
//! - [`UnixTransport`] maps names to Unix domain socket files below a
//!   directory, for observers running in another process.
//! - [`MemoryTransport`] pairs endpoints through an in-process registry of
//!   `crossbeam-channel` pipes, for tests and in-process observers.
//!
//! # Errors
//!
//! Every failure is a [`ChannelError`]. The tracing layer treats all of them
//! as unrecoverable; the observer treats [`ChannelError::Disconnected`] on a
//! record boundary as an orderly end of stream.
//!
//! # Examples
//!
//! ```
//! use std::thread;
//! use trace_io::{MemoryTransport, Transport, root_channel_name};
//!
//! let transport = MemoryTransport::new();
//! let name = root_channel_name("demo");
//! let traced = {
//!     let transport = transport.clone();
//!     let name = name.clone();
//!     thread::spawn(move || {
//!         let mut root = transport.listen(&name).expect("listen");
//!         root.write(&[10]).expect("write");
//!         root.close().expect("close");
//!     })
//! };
//!
//! let mut observer = transport.connect(&name).expect("connect");
//! let mut opcode = [0u8; 1];
//! observer.read_exact(&mut opcode).expect("read");
//! assert_eq!(opcode, [10]);
//! traced.join().expect("traced thread");
//! ```

mod channel;
mod error;
mod memory;
mod transport;
#[cfg(unix)]
mod unix;

pub use channel::{BoxedReader, BoxedWriter, Channel, ChannelReader, ChannelWriter};
pub use error::ChannelError;
pub use memory::MemoryTransport;
pub use transport::{DEFAULT_CONNECT_TIMEOUT, Transport, root_channel_name, thread_channel_name};
#[cfg(unix)]
pub use unix::UnixTransport;
