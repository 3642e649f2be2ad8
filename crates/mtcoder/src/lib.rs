#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! Ordered multi-threaded block coding.
//!
//! # Overview
//!
//! [`MtCoder`] splits a byte stream into fixed-size blocks and codes them
//! on a ring of worker threads. Turn events passed from each worker to its
//! successor guarantee that blocks are read from the input and written to
//! the output in their original order, while the [`BlockCodec`] calls for
//! neighbouring blocks run concurrently. Every turn event, stop-flag update
//! and progress lock is a traced `synctrace` primitive, so a ring running
//! under a trace session can be replayed and steered by an observer.
//!
//! # Errors
//!
//! Pipeline failures are [`SzError`] values. The first one raised by any
//! worker is latched, cascades once around the ring so every worker exits,
//! and is returned by [`MtCoder::code`] after all workers have been joined.
//! The single-shot [`compress_memory`] and [`decompress_memory`] entry
//! points translate failures into the [`ResultCode`] taxonomy.
//!
//! # Examples
//!
//! ```
//! use mtcoder::{MtCoderConfig, ZlibCodec, compress_memory, decompress_memory};
//! use synctrace::Tracer;
//!
//! let data = b"ring ordered blocks ".repeat(500);
//! let config = MtCoderConfig::default().with_num_threads(4).with_block_size(1024);
//! let mut tracer = Tracer::disabled();
//!
//! let mut packed = vec![0u8; data.len() * 2];
//! let size = compress_memory(&mut tracer, config, &ZlibCodec::default(), &mut packed, &data)
//!     .expect("compress");
//!
//! let mut unpacked = vec![0u8; data.len() + 64];
//! let done = decompress_memory(&mut ZlibCodec::default(), &mut unpacked, &packed[..size], true)
//!     .expect("decompress");
//! assert_eq!(&unpacked[..done.written], &data[..]);
//! ```

mod codec;
mod config;
mod error;
mod memory;
mod progress;
mod ring;
mod stream;

pub use codec::{
    BlockCodec, BlockDecoder, BlockJob, DecodeProgress, DecodeStatus, StoreCodec, ZlibCodec,
    ZlibLevel, ZlibLevelError,
};
pub use config::{DEFAULT_BLOCK_SIZE, MAX_THREADS, MtCoderConfig, dest_block_bound};
pub use error::{ResultCode, SzError};
pub use memory::{Decompressed, compress_memory, decompress_memory};
pub use progress::{ProgressAggregator, ProgressSink, ProgressTotals};
pub use ring::MtCoder;
pub use stream::{SeqInStream, SeqOutStream};
