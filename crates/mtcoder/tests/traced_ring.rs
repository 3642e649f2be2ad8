use std::sync::Arc;

use mtcoder::{MtCoder, MtCoderConfig, StoreCodec};
use synctrace::observer::{Observer, ObserverConfig};
use synctrace::{MAIN_THREAD_ID, ObservedEvent, TraceConfig, TraceSession, ViolationPolicy};
use trace_io::{MemoryTransport, Transport};
use trace_protocol::THREAD_CTOR;

fn count(log: &[ObservedEvent], label: &str) -> usize {
    log.iter().filter(|event| event.label() == Some(label)).count()
}

#[test]
fn ring_under_a_trace_session_is_fully_acknowledged() {
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let observer = Observer::connect(Arc::clone(&transport), "ring", ObserverConfig::default())
        .expect("observer");
    let mut tracer = TraceSession::init(
        "ring",
        transport,
        TraceConfig::default().with_violation_policy(ViolationPolicy::Panic),
    );

    let data: Vec<u8> = (0..450u32).map(|i| (i % 199) as u8).collect();
    let config = MtCoderConfig::default().with_num_threads(2).with_block_size(100);
    let mut coder = MtCoder::new(config).expect("config");
    let mut output = Vec::new();
    let totals = coder
        .code(&mut tracer, &StoreCodec, &mut &data[..], &mut output, None)
        .expect("code");
    TraceSession::stop(tracer);

    assert_eq!(output, data);
    assert_eq!(totals.total_in, 450);

    let log = observer.join().expect("clean trace");
    let spawned: Vec<_> = log
        .iter()
        .filter(|event| event.thread == MAIN_THREAD_ID && event.command() == Some(THREAD_CTOR))
        .collect();
    assert_eq!(spawned.len(), 2);

    // five blocks, each read and written under a bracketed flag update
    assert_eq!(count(&log, "MtThread_Process:2"), 10);
    assert_eq!(count(&log, "MtThread_Process:3"), 10);
    assert_eq!(count(&log, "ThreadFunc"), 0);
    assert_eq!(count(&log, "MtThread_Destruct"), 2);
    assert!(count(&log, "CriticalSection_Enter") >= 5);

    let workers: Vec<u32> = log
        .iter()
        .filter(|event| event.thread != MAIN_THREAD_ID && event.is_end_of_stream())
        .map(|event| event.thread)
        .collect();
    assert_eq!(workers.len(), 2);
    assert!(log.last().is_some_and(ObservedEvent::is_end_of_stream));
}
