//! The multi-worker block pipeline.
//!
//! `N` workers form a ring. Each slot owns an input buffer, an output
//! buffer, a `can_read` and a `can_write` turn event, and two stop flags
//! that its predecessor may raise. A worker loops over:
//!
//! 1. wait for `can_read`, then read one full block from the shared input;
//! 2. tell the successor whether the input ended and hand it `can_read`;
//! 3. code the block while the successor reads the next one;
//! 4. wait for `can_write`, append the coded block to the shared output and
//!    hand the successor `can_write`.
//!
//! Reads and writes therefore happen in block order while the codec calls
//! overlap. A failing worker latches its error, raises both stop flags on
//! its successor and releases both of its events; the failure travels once
//! around the ring and every worker exits.
//!
//! Flag updates are made under the session's global trace lock and
//! bracketed by syncs on the updating worker's slot, so an observer sees
//! them as atomic steps.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Scope};

use parking_lot::Mutex;
use synctrace::Tracer;
use synctrace::sync::{AutoResetEvent, ObjectId, ScopedTracedThread};
use trace_protocol::StatusCode;

use crate::codec::{BlockCodec, BlockJob};
use crate::config::{MtCoderConfig, alloc_buffer};
use crate::error::SzError;
use crate::progress::{ProgressAggregator, ProgressSink, ProgressTotals};
use crate::stream::{SeqInStream, SeqOutStream, read_full};

const TARGET: &str = "mtcoder::ring";

const CONSTRUCT: &str = "MtThread_Construct";
const PREPARE: &str = "MtThread_Prepare";
const PROCESS: &str = "MtThread_Process";
const PROCESS_READ: &str = "MtThread_Process:2";
const PROCESS_WRITE: &str = "MtThread_Process:3";
const THREAD_FUNC: &str = "ThreadFunc";
const CODE: &str = "MtCoder_Code";
const DESTRUCT: &str = "MtThread_Destruct";

type Panic = Box<dyn Any + Send + 'static>;

#[derive(Debug)]
struct SlotBuffers {
    input: Vec<u8>,
    output: Vec<u8>,
}

/// Per-call synchronisation state of one worker slot.
#[derive(Debug)]
struct Slot {
    id: ObjectId,
    can_read: AutoResetEvent,
    can_write: AutoResetEvent,
    stop_reading: AtomicBool,
    stop_writing: AtomicBool,
}

impl Slot {
    fn new(tracer: &mut Tracer) -> Self {
        let id = ObjectId::next();
        tracer.object_create(CONSTRUCT, id);
        let slot = Self {
            id,
            can_read: AutoResetEvent::new(tracer),
            can_write: AutoResetEvent::new(tracer),
            stop_reading: AtomicBool::new(true),
            stop_writing: AtomicBool::new(true),
        };
        slot.update(tracer, PREPARE, || {
            slot.stop_reading.store(false, Ordering::Release);
            slot.stop_writing.store(false, Ordering::Release);
        });
        slot
    }

    /// Runs `f` under the global trace lock, bracketed by syncs on this slot.
    fn update<R>(&self, tracer: &mut Tracer, label: &str, f: impl FnOnce() -> R) -> R {
        let _lock = tracer.global_lock();
        tracer.object_sync(label, self.id);
        let result = f();
        tracer.object_sync(label, self.id);
        result
    }

    fn close(self, tracer: &mut Tracer) {
        self.can_read.close(tracer);
        self.can_write.close(tracer);
        tracer.object_delete(DESTRUCT, self.id);
    }
}

fn turn(status: StatusCode) -> Result<(), SzError> {
    if status == StatusCode::Ok {
        Ok(())
    } else {
        Err(SzError::Thread)
    }
}

/// Everything the workers of one [`MtCoder::code`] call share.
struct Ring<'a, 's, C: ?Sized, I: ?Sized, O: ?Sized> {
    block_size: usize,
    codec: &'a C,
    input: Mutex<&'a mut I>,
    output: Mutex<&'a mut O>,
    progress: ProgressAggregator<'s>,
    slots: Vec<Slot>,
}

impl<C, I, O> Ring<'_, '_, C, I, O>
where
    C: BlockCodec + ?Sized,
    I: SeqInStream + Send + ?Sized,
    O: SeqOutStream + Send + ?Sized,
{
    fn next(&self, index: usize) -> &Slot {
        &self.slots[(index + 1) % self.slots.len()]
    }

    /// Spawns the workers, starts the ring and joins every worker.
    ///
    /// Returns the spawn failure, if any, and the first worker panic.
    fn launch<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        tracer: &mut Tracer,
        buffers: &'env mut [SlotBuffers],
    ) -> (Option<SzError>, Option<Panic>) {
        let mut workers = Vec::with_capacity(buffers.len());
        let mut spawn_error = None;
        for (index, buffers) in buffers.iter_mut().enumerate() {
            let spawned = ScopedTracedThread::spawn(scope, tracer, None, move |tracer| {
                self.run(tracer, index, buffers);
            });
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(error) => {
                    tracing::warn!(target: TARGET, index, %error, "cannot start ring worker");
                    spawn_error = Some(SzError::Thread);
                    let lead = &self.slots[0];
                    lead.update(tracer, CODE, || {
                        lead.stop_reading.store(true, Ordering::Release);
                    });
                    break;
                }
            }
        }

        let lead = &self.slots[0];
        lead.can_write.set(tracer);
        lead.can_read.set(tracer);

        let mut panicked = None;
        for worker in workers {
            if let Err(payload) = worker.join(tracer) {
                panicked.get_or_insert(payload);
            }
        }
        (spawn_error, panicked)
    }

    /// Worker body: processes blocks until the ring stops.
    fn run(&self, tracer: &mut Tracer, index: usize, buffers: &mut SlotBuffers) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            loop {
                match self.process(tracer, index, buffers) {
                    Ok(false) => {}
                    Ok(true) => return,
                    Err(error) => {
                        self.fail(tracer, index, error);
                        return;
                    }
                }
            }
        }));
        if let Err(payload) = outcome {
            tracing::error!(target: TARGET, index, "ring worker panicked");
            self.fail(tracer, index, SzError::Thread);
            panic::resume_unwind(payload);
        }
    }

    /// One turn of worker `index`. Returns `true` once the worker is done.
    fn process(
        &self,
        tracer: &mut Tracer,
        index: usize,
        buffers: &mut SlotBuffers,
    ) -> Result<bool, SzError> {
        let slot = &self.slots[index];
        let next = self.next(index);

        turn(slot.can_read.wait(tracer))?;
        let stopped = slot.update(tracer, PROCESS, || {
            let stopped = slot.stop_reading.load(Ordering::Acquire);
            if stopped {
                next.stop_reading.store(true, Ordering::Release);
            }
            stopped
        });
        if stopped {
            tracing::trace!(target: TARGET, index, "read turn stopped");
            turn(next.can_read.set(tracer))?;
            return Ok(true);
        }

        let size = {
            let mut input = self.input.lock();
            read_full(&mut **input, &mut buffers.input[..self.block_size])?
        };
        let last = size != self.block_size;
        slot.update(tracer, PROCESS_READ, || {
            next.stop_reading.store(last, Ordering::Release);
        });
        turn(next.can_read.set(tracer))?;
        tracing::trace!(target: TARGET, index, size, last, "block read");

        let written = {
            let mut job = BlockJob::new(index, tracer, &self.progress);
            self.codec
                .code(&mut job, &mut buffers.output, &buffers.input[..size], last)?
        };
        if written > buffers.output.len() {
            return Err(SzError::OutputEof);
        }
        self.progress
            .report(tracer, index, Some(size as u64), Some(written as u64))?;
        self.progress.reinit(tracer, index);

        turn(slot.can_write.wait(tracer))?;
        let stop_writing = slot.update(tracer, PROCESS_WRITE, || {
            slot.stop_writing.load(Ordering::Acquire)
        });
        if stop_writing {
            return Err(SzError::Fail);
        }
        let accepted = {
            let mut output = self.output.lock();
            SeqOutStream::write(&mut **output, &buffers.output[..written])
        };
        if accepted != written {
            return Err(SzError::Write);
        }
        tracing::trace!(target: TARGET, index, written, "block written");
        turn(next.can_write.set(tracer))?;
        Ok(last)
    }

    /// Latches `error` and stops the successor on both of its turns.
    fn fail(&self, tracer: &mut Tracer, index: usize, error: SzError) {
        tracing::debug!(target: TARGET, index, %error, "ring worker failed");
        self.progress.set_error(tracer, error);
        let next = self.next(index);
        self.slots[index].update(tracer, THREAD_FUNC, || {
            next.stop_reading.store(true, Ordering::Release);
            next.stop_writing.store(true, Ordering::Release);
        });
        next.can_read.set(tracer);
        next.can_write.set(tracer);
    }

    fn close(self, tracer: &mut Tracer) -> ProgressTotals {
        for slot in self.slots {
            slot.close(tracer);
        }
        self.progress.close(tracer)
    }
}

/// Multi-threaded block coder.
///
/// Splits its input into blocks of [`MtCoderConfig::block_size`] bytes and
/// codes them on a ring of [`MtCoderConfig::num_threads`] workers. Output
/// blocks are written in input order. Worker buffers are allocated on the
/// first call and reused afterwards.
///
/// # Examples
///
/// ```
/// use mtcoder::{MtCoder, MtCoderConfig, StoreCodec};
/// use synctrace::Tracer;
///
/// let mut coder = MtCoder::new(MtCoderConfig::default().with_num_threads(2).with_block_size(4))?;
/// let mut tracer = Tracer::disabled();
/// let mut output = Vec::new();
/// let totals = coder.code(&mut tracer, &StoreCodec, &mut &b"0123456789"[..], &mut output, None)?;
/// assert_eq!(output, b"0123456789");
/// assert_eq!(totals.total_in, 10);
/// # Ok::<(), mtcoder::SzError>(())
/// ```
#[derive(Debug)]
pub struct MtCoder {
    config: MtCoderConfig,
    buffers: Vec<SlotBuffers>,
}

impl MtCoder {
    /// Creates a coder for `config`.
    ///
    /// # Errors
    ///
    /// [`SzError::Param`] when the configuration is invalid.
    pub fn new(config: MtCoderConfig) -> Result<Self, SzError> {
        config.validate()?;
        Ok(Self {
            config,
            buffers: Vec::new(),
        })
    }

    /// The coder's configuration.
    #[must_use]
    pub const fn config(&self) -> &MtCoderConfig {
        &self.config
    }

    fn prepare_buffers(&mut self) -> Result<(), SzError> {
        if self.buffers.len() == self.config.num_threads {
            return Ok(());
        }
        let mut buffers = Vec::new();
        buffers
            .try_reserve_exact(self.config.num_threads)
            .map_err(|_| SzError::Mem)?;
        for _ in 0..self.config.num_threads {
            buffers.push(SlotBuffers {
                input: alloc_buffer(self.config.block_size)?,
                output: alloc_buffer(self.config.dest_block_size)?,
            });
        }
        self.buffers = buffers;
        Ok(())
    }

    /// Codes all of `input` into `output`.
    ///
    /// `progress` receives aggregated totals while the ring runs. The first
    /// error raised by any worker is returned once every worker has exited.
    ///
    /// # Errors
    ///
    /// [`SzError::Mem`] when the buffers cannot be allocated,
    /// [`SzError::Thread`] when a worker cannot be started, or the first
    /// error latched by a worker: the codec's own error, [`SzError::Read`],
    /// [`SzError::Write`] for a short write, [`SzError::Progress`] when the
    /// sink cancels.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the codec after all workers have been joined.
    pub fn code<C, I, O>(
        &mut self,
        tracer: &mut Tracer,
        codec: &C,
        input: &mut I,
        output: &mut O,
        progress: Option<&mut (dyn ProgressSink + Send)>,
    ) -> Result<ProgressTotals, SzError>
    where
        C: BlockCodec + ?Sized,
        I: SeqInStream + Send + ?Sized,
        O: SeqOutStream + Send + ?Sized,
    {
        self.prepare_buffers()?;
        let workers = self.config.num_threads;
        tracing::debug!(
            target: TARGET,
            workers,
            block_size = self.config.block_size,
            "starting ring"
        );

        let progress = ProgressAggregator::new(tracer, workers, progress);
        let slots = (0..workers).map(|_| Slot::new(tracer)).collect();
        let ring = Ring {
            block_size: self.config.block_size,
            codec,
            input: Mutex::new(input),
            output: Mutex::new(output),
            progress,
            slots,
        };

        let buffers = &mut self.buffers;
        let (spawn_error, panicked) =
            thread::scope(|scope| ring.launch(scope, tracer, buffers));
        let latched = ring.progress.error(tracer);
        let totals = ring.close(tracer);

        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
        match spawn_error.or(latched) {
            Some(error) => {
                tracing::debug!(target: TARGET, %error, "ring failed");
                Err(error)
            }
            None => {
                tracing::debug!(
                    target: TARGET,
                    total_in = totals.total_in,
                    total_out = totals.total_out,
                    "ring finished"
                );
                Ok(totals)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_rejected() {
        let config = MtCoderConfig::default().with_num_threads(0);
        assert_eq!(MtCoder::new(config).err(), Some(SzError::Param));
    }

    #[test]
    fn buffers_are_reused_between_calls() {
        let config = MtCoderConfig::default().with_num_threads(3).with_block_size(16);
        let mut coder = MtCoder::new(config).expect("config");
        let mut tracer = Tracer::disabled();
        for round in 0..3u8 {
            let data = vec![round; 40];
            let mut output = Vec::new();
            let totals = coder
                .code(&mut tracer, &crate::StoreCodec, &mut &data[..], &mut output, None)
                .expect("code");
            assert_eq!(output, data);
            assert_eq!(totals.total_out, 40);
            assert_eq!(coder.buffers.len(), 3);
        }
    }

    #[test]
    fn empty_input_codes_one_empty_block() {
        let mut coder = MtCoder::new(MtCoderConfig::default().with_block_size(8)).expect("config");
        let mut tracer = Tracer::disabled();
        let mut output = Vec::new();
        let totals = coder
            .code(&mut tracer, &crate::StoreCodec, &mut &[0u8; 0][..], &mut output, None)
            .expect("code");
        assert!(output.is_empty());
        assert_eq!(totals, ProgressTotals::default());
    }

    #[test]
    fn short_write_is_a_write_error() {
        let config = MtCoderConfig::default().with_num_threads(2).with_block_size(4);
        let mut coder = MtCoder::new(config).expect("config");
        let mut tracer = Tracer::disabled();
        let mut storage = [0u8; 6];
        let mut output = std::io::Cursor::new(&mut storage[..]);
        let result = coder.code(
            &mut tracer,
            &crate::StoreCodec,
            &mut &b"0123456789"[..],
            &mut output,
            None,
        );
        assert_eq!(result, Err(SzError::Write));
        assert_eq!(&storage, b"012345");
    }
}
