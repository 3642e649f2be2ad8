//! Single-shot entry points over memory buffers.
//!
//! These never return an [`SzError`]; failures are translated into the
//! [`ResultCode`] taxonomy, with separate mappings for the encoder and the
//! decoder side.

use std::io;

use synctrace::Tracer;

use crate::codec::{BlockCodec, BlockDecoder, DecodeStatus};
use crate::config::MtCoderConfig;
use crate::error::{ResultCode, SzError};
use crate::ring::MtCoder;

/// Compresses `src` into `dest` with a ring configured by `config`.
///
/// Returns the number of bytes written to `dest`.
///
/// # Errors
///
/// [`ResultCode::OutputEnd`] when `dest` is too small, otherwise the
/// encoder mapping of the pipeline's error.
///
/// # Examples
///
/// ```
/// use mtcoder::{MtCoderConfig, ResultCode, StoreCodec, compress_memory};
/// use synctrace::Tracer;
///
/// let mut tracer = Tracer::disabled();
/// let config = MtCoderConfig::default().with_block_size(4);
/// let mut dest = [0u8; 6];
/// assert_eq!(compress_memory(&mut tracer, config, &StoreCodec, &mut dest, b"abc"), Ok(3));
/// assert_eq!(
///     compress_memory(&mut tracer, config, &StoreCodec, &mut dest, b"abcdefgh"),
///     Err(ResultCode::OutputEnd)
/// );
/// ```
pub fn compress_memory<C>(
    tracer: &mut Tracer,
    config: MtCoderConfig,
    codec: &C,
    dest: &mut [u8],
    src: &[u8],
) -> Result<usize, ResultCode>
where
    C: BlockCodec + ?Sized,
{
    let mut coder = MtCoder::new(config).map_err(ResultCode::from_encoder)?;
    let mut input = src;
    let mut output = io::Cursor::new(dest);
    match coder.code(tracer, codec, &mut input, &mut output, None) {
        Ok(_) => Ok(output.position() as usize),
        // the cursor is the only sink, so a short write means `dest` is full
        Err(SzError::Write) => Err(ResultCode::OutputEnd),
        Err(error) => Err(ResultCode::from_encoder(error)),
    }
}

/// Byte counts of a successful [`decompress_memory`] call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Decompressed {
    /// Bytes written to the destination.
    pub written: usize,
    /// Bytes consumed from the source.
    pub consumed: usize,
}

/// Decodes `src` into `dest` with `decoder`.
///
/// `end_mark` states whether the stream is expected to carry an explicit
/// end marker: a stream that finishes with a marker is accepted only when
/// one is expected, and a stream that merely may have finished only when
/// none is.
///
/// # Errors
///
/// The decoder mapping of the decoder's error, [`ResultCode::InputEnd`]
/// when `src` is truncated, [`ResultCode::OutputEnd`] when `dest` is too
/// small, and [`ResultCode::Unknown`] when the end-marker expectation is
/// not met.
pub fn decompress_memory<D>(
    decoder: &mut D,
    dest: &mut [u8],
    src: &[u8],
    end_mark: bool,
) -> Result<Decompressed, ResultCode>
where
    D: BlockDecoder + ?Sized,
{
    let mut written = 0;
    let mut consumed = 0;
    loop {
        let step = decoder
            .decode(&mut dest[written..], &src[consumed..])
            .map_err(ResultCode::from_decoder)?;
        written += step.produced;
        consumed += step.consumed;
        let stalled = step.produced == 0 && step.consumed == 0;
        match step.status {
            DecodeStatus::FinishedWithMark if end_mark => break,
            DecodeStatus::MaybeFinishedWithoutMark if !end_mark => break,
            DecodeStatus::FinishedWithMark | DecodeStatus::MaybeFinishedWithoutMark => {
                tracing::debug!(
                    target: "mtcoder::memory",
                    status = ?step.status,
                    end_mark,
                    "stream end does not match the end-mark expectation"
                );
                return Err(ResultCode::Unknown);
            }
            DecodeStatus::NeedsMoreInput if stalled => return Err(ResultCode::InputEnd),
            DecodeStatus::NotFinished if stalled => return Err(ResultCode::OutputEnd),
            DecodeStatus::NeedsMoreInput | DecodeStatus::NotFinished => {}
        }
    }
    Ok(Decompressed { written, consumed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{StoreCodec, ZlibCodec, ZlibLevel};

    fn config() -> MtCoderConfig {
        MtCoderConfig::default().with_num_threads(3).with_block_size(1000)
    }

    fn sample() -> Vec<u8> {
        (0..10_000u32).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn zlib_round_trip_expects_end_mark() {
        let mut tracer = Tracer::disabled();
        let data = sample();
        let mut compressed = vec![0u8; data.len() * 2];
        let size = compress_memory(
            &mut tracer,
            config(),
            &ZlibCodec::new(ZlibLevel::Fast),
            &mut compressed,
            &data,
        )
        .expect("compress");

        let mut decoded = vec![0u8; data.len() + 16];
        let done = decompress_memory(
            &mut ZlibCodec::default(),
            &mut decoded,
            &compressed[..size],
            true,
        )
        .expect("decompress");
        assert_eq!(done, Decompressed { written: data.len(), consumed: size });
        assert_eq!(&decoded[..done.written], &data[..]);

        assert_eq!(
            decompress_memory(&mut ZlibCodec::default(), &mut decoded, &compressed[..size], false),
            Err(ResultCode::Unknown)
        );
    }

    #[test]
    fn stored_stream_has_no_end_mark() {
        let data = sample();
        let mut decoded = vec![0u8; data.len()];
        let done = decompress_memory(&mut StoreCodec, &mut decoded, &data, false).expect("decode");
        assert_eq!(done.written, data.len());
        assert_eq!(
            decompress_memory(&mut StoreCodec, &mut decoded, &data, true),
            Err(ResultCode::Unknown)
        );
    }

    #[test]
    fn small_destination_is_output_end() {
        let mut tracer = Tracer::disabled();
        let data = sample();
        let mut dest = vec![0u8; data.len() - 1];
        assert_eq!(
            compress_memory(&mut tracer, config(), &StoreCodec, &mut dest, &data),
            Err(ResultCode::OutputEnd)
        );
        assert_eq!(
            decompress_memory(&mut StoreCodec, &mut dest, &data, false),
            Err(ResultCode::OutputEnd)
        );
    }

    #[test]
    fn truncated_zlib_is_input_end() {
        let mut tracer = Tracer::disabled();
        let data = sample();
        let mut compressed = vec![0u8; data.len() * 2];
        let size = compress_memory(&mut tracer, config(), &ZlibCodec::default(), &mut compressed, &data)
            .expect("compress");
        let mut decoded = vec![0u8; data.len() + 16];
        assert_eq!(
            decompress_memory(&mut ZlibCodec::default(), &mut decoded, &compressed[..size - 3], true),
            Err(ResultCode::InputEnd)
        );
    }

    #[test]
    fn corrupt_zlib_is_data_error() {
        let mut decoded = [0u8; 64];
        assert_eq!(
            decompress_memory(&mut ZlibCodec::default(), &mut decoded, &[0x78, 0x9c, 0xff, 0xff, 0xff], true),
            Err(ResultCode::Data)
        );
    }

    #[test]
    fn invalid_config_is_parameter_error() {
        let mut tracer = Tracer::disabled();
        let mut dest = [0u8; 8];
        assert_eq!(
            compress_memory(&mut tracer, config().with_num_threads(99), &StoreCodec, &mut dest, b"x"),
            Err(ResultCode::Parameter)
        );
    }
}
