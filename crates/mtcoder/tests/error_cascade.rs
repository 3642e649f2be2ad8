use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};

use mtcoder::{BlockCodec, BlockJob, MtCoder, MtCoderConfig, ProgressSink, SzError};
use synctrace::Tracer;

const BLOCK: usize = 256;

/// Copies blocks, failing on the block tagged `fail_at`.
struct FailAt {
    fail_at: u8,
    coded: AtomicUsize,
}

impl FailAt {
    fn new(fail_at: u8) -> Self {
        Self {
            fail_at,
            coded: AtomicUsize::new(0),
        }
    }
}

impl BlockCodec for FailAt {
    fn code(
        &self,
        _job: &mut BlockJob<'_, '_>,
        output: &mut [u8],
        input: &[u8],
        _is_final: bool,
    ) -> Result<usize, SzError> {
        self.coded.fetch_add(1, Ordering::Relaxed);
        if input.first() == Some(&self.fail_at) {
            return Err(SzError::Data);
        }
        output[..input.len()].copy_from_slice(input);
        Ok(input.len())
    }
}

fn input(blocks: u8) -> Vec<u8> {
    (0..blocks).flat_map(|k| [k; BLOCK]).collect()
}

#[test]
fn failure_in_any_slot_stops_the_ring() {
    const WORKERS: usize = 4;
    let data = input(12);
    for fail_at in 0..WORKERS as u8 * 2 {
        let config = MtCoderConfig::default()
            .with_num_threads(WORKERS)
            .with_block_size(BLOCK);
        let mut coder = MtCoder::new(config).expect("config");
        let mut tracer = Tracer::disabled();
        let codec = FailAt::new(fail_at);
        let mut output = Vec::new();
        let result = coder.code(&mut tracer, &codec, &mut &data[..], &mut output, None);

        assert_eq!(result, Err(SzError::Data), "failing block {fail_at}");
        // a whole-block prefix of what precedes the failing block; older
        // blocks still being coded by the successor are dropped
        assert_eq!(output.len() % BLOCK, 0, "failing block {fail_at}");
        assert!(output.len() <= usize::from(fail_at) * BLOCK, "failing block {fail_at}");
        assert!(data.starts_with(&output), "failing block {fail_at}");
        // at most one block per worker is in flight past the failure
        assert!(codec.coded.load(Ordering::Relaxed) <= usize::from(fail_at) + WORKERS);
    }
}

#[test]
fn failing_input_stream_is_a_read_error() {
    struct Broken;

    impl std::io::Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("device gone"))
        }
    }

    let config = MtCoderConfig::default().with_num_threads(3).with_block_size(BLOCK);
    let mut coder = MtCoder::new(config).expect("config");
    let mut tracer = Tracer::disabled();
    let mut output = Vec::new();
    let result = coder.code(&mut tracer, &FailAt::new(u8::MAX), &mut Broken, &mut output, None);
    assert_eq!(result, Err(SzError::Read));
    assert!(output.is_empty());
}

#[test]
fn cancelling_sink_stops_with_progress_error() {
    let data = input(16);
    let config = MtCoderConfig::default().with_num_threads(2).with_block_size(BLOCK);
    let mut coder = MtCoder::new(config).expect("config");
    let mut tracer = Tracer::disabled();
    let mut calls = 0usize;
    let mut sink = |total_in: u64, _total_out: u64| {
        calls += 1;
        if total_in >= 4 * BLOCK as u64 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    let mut output = Vec::new();
    let result = coder.code(
        &mut tracer,
        &FailAt::new(u8::MAX),
        &mut &data[..],
        &mut output,
        Some(&mut sink as &mut (dyn ProgressSink + Send)),
    );
    assert_eq!(result, Err(SzError::Progress));
    assert!(output.len() < data.len());
    assert!(calls >= 4);
}

#[test]
fn codec_panic_is_resumed_after_the_ring_stops() {
    struct Panics;

    impl BlockCodec for Panics {
        fn code(
            &self,
            _job: &mut BlockJob<'_, '_>,
            _output: &mut [u8],
            input: &[u8],
            _is_final: bool,
        ) -> Result<usize, SzError> {
            assert!(input.first() != Some(&2), "codec exploded");
            Ok(0)
        }
    }

    let data = input(6);
    let outcome = std::panic::catch_unwind(move || {
        let config = MtCoderConfig::default().with_num_threads(3).with_block_size(BLOCK);
        let mut coder = MtCoder::new(config).expect("config");
        let mut tracer = Tracer::disabled();
        let mut output = Vec::new();
        coder.code(&mut tracer, &Panics, &mut &data[..], &mut output, None)
    });
    let payload = outcome.expect_err("panic resumed");
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied());
    assert_eq!(message, Some("codec exploded"));
}
