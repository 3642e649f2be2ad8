use std::sync::Arc;

use synctrace::observer::{Observer, ObserverConfig};
use synctrace::{TraceConfig, TraceSession, ViolationPolicy};
use trace_io::{MemoryTransport, Transport};

#[test]
#[should_panic(expected = "invalid code 13")]
fn status_outside_the_result_codes_is_a_violation() {
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let _observer = Observer::connect(Arc::clone(&transport), "status", ObserverConfig::default())
        .expect("observer");
    let mut tracer = TraceSession::init(
        "status",
        transport,
        TraceConfig::default().with_violation_policy(ViolationPolicy::Panic),
    );
    tracer.status("Thread_Create", 13u32);
}
