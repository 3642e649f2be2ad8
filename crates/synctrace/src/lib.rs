#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! Acknowledged tracing of synchronisation primitives.
//!
//! # Overview
//!
//! A process starts one [`TraceSession`] and gets back the calling thread's
//! [`Tracer`]. Every instrumented primitive in [`sync`] takes the calling
//! thread's tracer and writes a record to an external [`Observer`] before or
//! after the real operation, then blocks until the observer acknowledges
//! it. Since no thread can get more than one record ahead, the observer's
//! event log is a total order of the primitive operations the process
//! actually performed, and the observer decides when each thread may
//! continue.
//!
//! Threads spawned through [`TracedThread`] attach their own tracer to the
//! spawner's session before user code runs. Labels are interned once per
//! process in the session's string table and cached per thread.
//!
//! # Violations
//!
//! Channel failures, acknowledgment mismatches, invalid status codes and
//! misuse of a detached context are [`ProtocolViolation`]s. They never
//! return to the caller: [`fatal`] logs them and applies the session's
//! [`ViolationPolicy`], which aborts the process unless tests ask for a
//! panic.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use synctrace::observer::{Observer, ObserverConfig};
//! use synctrace::sync::AutoResetEvent;
//! use synctrace::{TraceConfig, TraceSession, ViolationPolicy};
//! use trace_io::{MemoryTransport, Transport};
//!
//! let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
//! let observer = Observer::connect(Arc::clone(&transport), "lib-doc", ObserverConfig::default())
//!     .expect("observer");
//!
//! let config = TraceConfig::default().with_violation_policy(ViolationPolicy::Panic);
//! let mut tracer = TraceSession::init("lib-doc", transport, config);
//! let event = AutoResetEvent::new(&mut tracer);
//! event.set(&mut tracer);
//! event.wait(&mut tracer);
//! event.close(&mut tracer);
//! TraceSession::stop(tracer);
//!
//! let labels: Vec<_> = observer
//!     .join()
//!     .expect("clean trace")
//!     .iter()
//!     .filter_map(|event| event.label().map(str::to_owned))
//!     .collect();
//! assert_eq!(labels.first().map(String::as_str), Some("Event_Create"));
//! assert_eq!(labels.last().map(String::as_str), Some("Event_Close"));
//! ```

mod config;
mod context;
mod lock;
pub mod observer;
mod registry;
mod session;
mod string_table;
pub mod sync;
mod tracer;
mod violation;

pub use config::{DEFAULT_THREAD_NAME, TraceConfig};
pub use context::{ContextState, TraceArg, TraceContext};
pub use lock::GlobalLock;
pub use observer::{ObservedEvent, Observer, ObserverConfig, ObserverError};
pub use session::{MAIN_THREAD_ID, TraceSession};
pub use string_table::{StringCache, StringTable};
pub use sync::{ObjectId, TracedThread};
pub use tracer::Tracer;
pub use violation::{ProtocolViolation, ViolationPolicy, fatal};
