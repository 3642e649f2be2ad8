//! Progress accounting shared by the workers of a ring.
//!
//! Each worker reports the running byte counts of the block it is coding.
//! The aggregator turns those per-worker figures into session totals by
//! adding the delta since the worker's previous report, then forwards the
//! totals to an optional caller-supplied [`ProgressSink`]. The first error
//! seen by any worker is latched here as well, which is how a failure in
//! one worker becomes visible to the others' progress reports.

use std::fmt;
use std::ops::ControlFlow;

use synctrace::Tracer;
use synctrace::sync::CriticalSection;

use crate::error::SzError;

/// Receives aggregated totals while a ring is running.
///
/// Returning [`ControlFlow::Break`] cancels the operation with
/// [`SzError::Progress`].
pub trait ProgressSink {
    /// Called with the bytes consumed and produced so far.
    fn progress(&mut self, total_in: u64, total_out: u64) -> ControlFlow<()>;
}

impl<F> ProgressSink for F
where
    F: FnMut(u64, u64) -> ControlFlow<()>,
{
    fn progress(&mut self, total_in: u64, total_out: u64) -> ControlFlow<()> {
        self(total_in, total_out)
    }
}

/// Bytes consumed and produced across every worker.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProgressTotals {
    /// Input bytes accounted so far.
    pub total_in: u64,
    /// Output bytes accounted so far.
    pub total_out: u64,
}

struct State<'s> {
    in_sizes: Vec<u64>,
    out_sizes: Vec<u64>,
    totals: ProgressTotals,
    sink: Option<&'s mut (dyn ProgressSink + Send)>,
    error: Option<SzError>,
}

impl fmt::Debug for State<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("in_sizes", &self.in_sizes)
            .field("out_sizes", &self.out_sizes)
            .field("totals", &self.totals)
            .field("sink", &self.sink.is_some())
            .field("error", &self.error)
            .finish()
    }
}

fn update(size: Option<u64>, previous: &mut u64, total: &mut u64) {
    if let Some(size) = size {
        *total = total.wrapping_add(size.wrapping_sub(*previous));
        *previous = size;
    }
}

/// Thread-safe merge of per-worker counters.
///
/// The counters live in a traced [`CriticalSection`] distinct from the
/// session's global lock.
#[derive(Debug)]
pub struct ProgressAggregator<'s> {
    state: CriticalSection<State<'s>>,
}

impl<'s> ProgressAggregator<'s> {
    /// Creates an aggregator for `workers` slots.
    pub fn new(
        tracer: &mut Tracer,
        workers: usize,
        sink: Option<&'s mut (dyn ProgressSink + Send)>,
    ) -> Self {
        let state = State {
            in_sizes: vec![0; workers],
            out_sizes: vec![0; workers],
            totals: ProgressTotals::default(),
            sink,
            error: None,
        };
        Self {
            state: CriticalSection::new(tracer, state),
        }
    }

    /// Records the running counts of worker `index`.
    ///
    /// `None` leaves the corresponding counter untouched. The sink is
    /// consulted only while no error is latched.
    ///
    /// # Errors
    ///
    /// Returns the latched error, which may be the sink's
    /// [`SzError::Progress`] raised by this very call.
    pub fn report(
        &self,
        tracer: &mut Tracer,
        index: usize,
        in_size: Option<u64>,
        out_size: Option<u64>,
    ) -> Result<(), SzError> {
        let mut guard = self.state.enter(tracer);
        let state = &mut *guard;
        if let (Some(previous_in), Some(previous_out)) =
            (state.in_sizes.get_mut(index), state.out_sizes.get_mut(index))
        {
            update(in_size, previous_in, &mut state.totals.total_in);
            update(out_size, previous_out, &mut state.totals.total_out);
        }
        if state.error.is_none()
            && let Some(sink) = state.sink.as_deref_mut()
            && sink
                .progress(state.totals.total_in, state.totals.total_out)
                .is_break()
        {
            state.error = Some(SzError::Progress);
        }
        state.error.map_or(Ok(()), Err)
    }

    /// Zeroes the baselines of worker `index` before it codes its next
    /// block. Totals are kept.
    pub fn reinit(&self, tracer: &mut Tracer, index: usize) {
        let mut state = self.state.enter(tracer);
        if let Some(size) = state.in_sizes.get_mut(index) {
            *size = 0;
        }
        if let Some(size) = state.out_sizes.get_mut(index) {
            *size = 0;
        }
    }

    /// Latches `error` unless an earlier one is already latched.
    pub fn set_error(&self, tracer: &mut Tracer, error: SzError) {
        let mut state = self.state.enter(tracer);
        if state.error.is_none() {
            state.error = Some(error);
        }
    }

    /// The latched error, if any.
    pub fn error(&self, tracer: &mut Tracer) -> Option<SzError> {
        self.state.enter(tracer).error
    }

    /// Current totals.
    pub fn totals(&self, tracer: &mut Tracer) -> ProgressTotals {
        self.state.enter(tracer).totals
    }

    /// Destroys the aggregator and returns the final totals.
    pub fn close(self, tracer: &mut Tracer) -> ProgressTotals {
        self.state.close(tracer).totals
    }
}
