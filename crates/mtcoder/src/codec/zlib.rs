use std::num::NonZeroU8;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use thiserror::Error;

use super::{BlockCodec, BlockDecoder, BlockJob, DecodeProgress, DecodeStatus};
use crate::error::SzError;

/// Compression levels accepted by [`ZlibCodec`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ZlibLevel {
    /// Favour speed over ratio.
    Fast,
    /// zlib's default balance.
    #[default]
    Default,
    /// Favour ratio over speed.
    Best,
    /// An explicit level in `1..=9`.
    Precise(NonZeroU8),
}

impl ZlibLevel {
    /// Builds a [`ZlibLevel::Precise`] from a numeric level.
    ///
    /// # Errors
    ///
    /// Returns [`ZlibLevelError`] when `level` is outside `1..=9`.
    pub fn from_numeric(level: u32) -> Result<Self, ZlibLevelError> {
        u8::try_from(level)
            .ok()
            .filter(|level| (1..=9).contains(level))
            .and_then(NonZeroU8::new)
            .map(Self::Precise)
            .ok_or(ZlibLevelError { level })
    }
}

impl From<ZlibLevel> for Compression {
    fn from(level: ZlibLevel) -> Self {
        match level {
            ZlibLevel::Fast => Self::fast(),
            ZlibLevel::Default => Self::default(),
            ZlibLevel::Best => Self::best(),
            ZlibLevel::Precise(value) => Self::new(u32::from(value.get())),
        }
    }
}

/// A zlib level outside `1..=9` was requested.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("zlib compression level {level} is outside 1..=9")]
pub struct ZlibLevelError {
    level: u32,
}

impl ZlibLevelError {
    /// The rejected level.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }
}

/// Codec that deflates every block into an independent zlib stream.
///
/// The ring's output is therefore a concatenation of zlib streams; the same
/// type decodes such a concatenation through [`BlockDecoder`], reporting
/// [`DecodeStatus::FinishedWithMark`] once the last stream's trailer has
/// been read.
#[derive(Debug, Default)]
pub struct ZlibCodec {
    level: ZlibLevel,
    inflater: Option<Decompress>,
}

impl ZlibCodec {
    /// Creates a codec compressing at `level`.
    #[must_use]
    pub const fn new(level: ZlibLevel) -> Self {
        Self {
            level,
            inflater: None,
        }
    }

    /// Configured level.
    #[must_use]
    pub const fn level(&self) -> ZlibLevel {
        self.level
    }
}

fn delta(after: u64, before: u64) -> usize {
    usize::try_from(after - before).unwrap_or(usize::MAX)
}

impl BlockCodec for ZlibCodec {
    fn code(
        &self,
        job: &mut BlockJob<'_, '_>,
        output: &mut [u8],
        input: &[u8],
        _is_final: bool,
    ) -> Result<usize, SzError> {
        let mut deflater = Compress::new(self.level.into(), true);
        let status = deflater
            .compress(input, output, FlushCompress::Finish)
            .map_err(|error| {
                tracing::debug!(target: "mtcoder::codec", %error, "deflate failed");
                SzError::Fail
            })?;
        job.report(deflater.total_in(), deflater.total_out())?;
        match status {
            Status::StreamEnd => Ok(delta(deflater.total_out(), 0)),
            Status::Ok | Status::BufError => Err(SzError::OutputEof),
        }
    }
}

impl BlockDecoder for ZlibCodec {
    fn decode(&mut self, output: &mut [u8], input: &[u8]) -> Result<DecodeProgress, SzError> {
        let inflater = self.inflater.get_or_insert_with(|| Decompress::new(true));
        let (in_before, out_before) = (inflater.total_in(), inflater.total_out());
        let status = inflater
            .decompress(input, output, FlushDecompress::None)
            .map_err(|error| {
                tracing::debug!(target: "mtcoder::codec", %error, "inflate failed");
                SzError::Data
            })?;
        let consumed = delta(inflater.total_in(), in_before);
        let produced = delta(inflater.total_out(), out_before);
        let status = match status {
            Status::StreamEnd => {
                inflater.reset(true);
                if consumed < input.len() {
                    DecodeStatus::NotFinished
                } else {
                    DecodeStatus::FinishedWithMark
                }
            }
            Status::Ok | Status::BufError => {
                let room_left = produced < output.len() || output.is_empty();
                if consumed == input.len() && room_left {
                    DecodeStatus::NeedsMoreInput
                } else {
                    DecodeStatus::NotFinished
                }
            }
        };
        Ok(DecodeProgress {
            consumed,
            produced,
            status,
        })
    }
}
