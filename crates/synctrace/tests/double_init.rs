use std::sync::Arc;

use synctrace::observer::{Observer, ObserverConfig};
use synctrace::{TraceConfig, TraceSession, ViolationPolicy};
use trace_io::{MemoryTransport, Transport};

#[test]
#[should_panic(expected = "already running")]
fn second_session_is_a_violation() {
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let _observer = Observer::connect(Arc::clone(&transport), "first", ObserverConfig::default())
        .expect("observer");
    let config = TraceConfig::default().with_violation_policy(ViolationPolicy::Panic);
    let _first = TraceSession::init("first", Arc::clone(&transport), config.clone());
    let _second = TraceSession::init("second", transport, config);
}
