//! The seam between the ring and the block transform it parallelises.
//!
//! The ring only moves bytes; what happens to a block is decided by a
//! [`BlockCodec`]. Single-shot decompression drives a [`BlockDecoder`]
//! instead. Two reference implementations ship with the crate:
//! [`StoreCodec`] copies data unchanged and [`ZlibCodec`] deflates every
//! block into its own zlib stream.

mod store;
mod zlib;

pub use store::StoreCodec;
pub use zlib::{ZlibCodec, ZlibLevel, ZlibLevelError};

use synctrace::Tracer;

use crate::error::SzError;
use crate::progress::ProgressAggregator;

/// Context handed to a [`BlockCodec`] for one block.
///
/// Exposes the worker's slot index and its own tracer, and lets the codec
/// publish intermediate byte counts.
#[derive(Debug)]
pub struct BlockJob<'a, 's> {
    index: usize,
    tracer: &'a mut Tracer,
    progress: &'a ProgressAggregator<'s>,
}

impl<'a, 's> BlockJob<'a, 's> {
    pub(crate) fn new(
        index: usize,
        tracer: &'a mut Tracer,
        progress: &'a ProgressAggregator<'s>,
    ) -> Self {
        Self {
            index,
            tracer,
            progress,
        }
    }

    /// Slot of the worker coding this block.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The worker thread's tracer.
    pub fn tracer(&mut self) -> &mut Tracer {
        self.tracer
    }

    /// Reports the bytes consumed and produced so far for this block.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's latched error so a long-running codec can
    /// stop early.
    pub fn report(&mut self, in_size: u64, out_size: u64) -> Result<(), SzError> {
        self.progress
            .report(self.tracer, self.index, Some(in_size), Some(out_size))
    }
}

/// Transform applied to each block by a ring worker.
///
/// Codecs are shared by every worker, so they must be [`Sync`]; per-block
/// state belongs on the stack of [`BlockCodec::code`].
pub trait BlockCodec: Sync {
    /// Codes `input` into `output` and returns the number of bytes written.
    ///
    /// `is_final` is set for the last block of the stream, which may be
    /// shorter than the block size or empty.
    ///
    /// # Errors
    ///
    /// Any [`SzError`]; the ring latches the first one and stops.
    fn code(
        &self,
        job: &mut BlockJob<'_, '_>,
        output: &mut [u8],
        input: &[u8],
        is_final: bool,
    ) -> Result<usize, SzError>;
}

impl<C: BlockCodec + ?Sized> BlockCodec for &C {
    fn code(
        &self,
        job: &mut BlockJob<'_, '_>,
        output: &mut [u8],
        input: &[u8],
        is_final: bool,
    ) -> Result<usize, SzError> {
        (**self).code(job, output, input, is_final)
    }
}

/// Where a decoder stopped.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DecodeStatus {
    /// The stream ended with an explicit end marker.
    FinishedWithMark,
    /// The output buffer filled up before the stream ended.
    NotFinished,
    /// The input ran out in the middle of the stream.
    NeedsMoreInput,
    /// All input was consumed at a point where the stream may end.
    MaybeFinishedWithoutMark,
}

/// Outcome of one [`BlockDecoder::decode`] call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DecodeProgress {
    /// Input bytes consumed.
    pub consumed: usize,
    /// Output bytes produced.
    pub produced: usize,
    /// State after the call.
    pub status: DecodeStatus,
}

/// Incremental decoder used by [`decompress_memory`](crate::decompress_memory).
pub trait BlockDecoder {
    /// Decodes as much of `input` into `output` as possible.
    ///
    /// # Errors
    ///
    /// [`SzError::Data`] for corrupt input, or another [`SzError`].
    fn decode(&mut self, output: &mut [u8], input: &[u8]) -> Result<DecodeProgress, SzError>;
}
