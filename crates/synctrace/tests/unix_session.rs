#![cfg(unix)]

use std::sync::Arc;

use synctrace::observer::{Observer, ObserverConfig};
use synctrace::sync::CriticalSection;
use synctrace::{TraceConfig, TraceSession, ViolationPolicy};
use trace_io::{Transport, UnixTransport};

#[test]
fn session_runs_over_unix_sockets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transport: Arc<dyn Transport> = Arc::new(UnixTransport::new(dir.path()));
    let observer =
        Observer::connect(Arc::clone(&transport), "unix-session", ObserverConfig::default())
            .expect("observer");

    let mut tracer = TraceSession::init(
        "unix-session",
        transport,
        TraceConfig::default().with_violation_policy(ViolationPolicy::Panic),
    );
    let section = CriticalSection::new(&mut tracer, Vec::<u8>::new());
    section.enter(&mut tracer).push(7);
    assert_eq!(section.close(&mut tracer), vec![7]);
    TraceSession::stop(tracer);

    let log = observer.join().expect("clean trace");
    assert_eq!(log.len(), 5);
    assert!(log[4].is_end_of_stream());
}
