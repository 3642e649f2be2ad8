use super::{BlockCodec, BlockDecoder, BlockJob, DecodeProgress, DecodeStatus};
use crate::error::SzError;

/// Codec that copies blocks unchanged.
///
/// Useful to measure the pipeline itself and as the decoder for stored
/// streams, which carry no end marker.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StoreCodec;

impl BlockCodec for StoreCodec {
    fn code(
        &self,
        _job: &mut BlockJob<'_, '_>,
        output: &mut [u8],
        input: &[u8],
        _is_final: bool,
    ) -> Result<usize, SzError> {
        let target = output.get_mut(..input.len()).ok_or(SzError::OutputEof)?;
        target.copy_from_slice(input);
        Ok(input.len())
    }
}

impl BlockDecoder for StoreCodec {
    fn decode(&mut self, output: &mut [u8], input: &[u8]) -> Result<DecodeProgress, SzError> {
        let len = input.len().min(output.len());
        output[..len].copy_from_slice(&input[..len]);
        let status = if len == input.len() {
            DecodeStatus::MaybeFinishedWithoutMark
        } else {
            DecodeStatus::NotFinished
        };
        Ok(DecodeProgress {
            consumed: len,
            produced: len,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use synctrace::Tracer;

    use super::*;
    use crate::progress::ProgressAggregator;

    #[test]
    fn encode_copies_block() {
        let mut tracer = Tracer::disabled();
        let progress = ProgressAggregator::new(&mut tracer, 1, None);
        let mut output = [0u8; 8];
        let written = {
            let mut job = BlockJob::new(0, &mut tracer, &progress);
            StoreCodec.code(&mut job, &mut output, b"block", true)
        };
        assert_eq!(written, Ok(5));
        assert_eq!(&output[..5], b"block");
    }

    #[test]
    fn encode_into_small_buffer_fails() {
        let mut tracer = Tracer::disabled();
        let progress = ProgressAggregator::new(&mut tracer, 1, None);
        let mut job = BlockJob::new(0, &mut tracer, &progress);
        let mut output = [0u8; 2];
        assert_eq!(
            StoreCodec.code(&mut job, &mut output, b"block", false),
            Err(SzError::OutputEof)
        );
    }

    #[test]
    fn decode_stops_when_output_is_full() {
        let mut decoder = StoreCodec;
        let mut output = [0u8; 3];
        let step = decoder.decode(&mut output, b"abcde").expect("decode");
        assert_eq!(step.consumed, 3);
        assert_eq!(step.status, DecodeStatus::NotFinished);

        let step = decoder.decode(&mut output, b"de").expect("decode");
        assert_eq!(step.produced, 2);
        assert_eq!(step.status, DecodeStatus::MaybeFinishedWithoutMark);
    }
}
