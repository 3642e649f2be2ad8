use std::io;
use std::sync::Arc;
use std::thread::{self, Builder, JoinHandle, Scope, ScopedJoinHandle};

use trace_protocol::StatusCode;

use crate::session::TraceSession;
use crate::tracer::Tracer;

const CREATE: &str = "Thread_Create";
const WAIT: &str = "Thread_Wait";

/// Thread whose lifetime is traced.
///
/// The child attaches its own [`Tracer`] to the spawner's session before
/// the user closure runs and detaches it afterwards. The spawner reports
/// the creation once the OS thread exists; [`TracedThread::join`] reports
/// the wait and the close.
#[derive(Debug)]
pub struct TracedThread<T> {
    handle: JoinHandle<T>,
    thread: u32,
}

impl<T: Send + 'static> TracedThread<T> {
    /// Spawns `f` on a new thread named `name`, or after the session's
    /// configured thread name when `None`.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be created; the failure
    /// is reported with status [`StatusCode::Thread`].
    pub fn spawn<F>(tracer: &mut Tracer, name: Option<&str>, f: F) -> io::Result<Self>
    where
        F: FnOnce(&mut Tracer) -> T + Send + 'static,
    {
        let (session, thread, builder) = prepare(tracer, name);
        let spawned = builder.spawn(move || run_attached(session, thread, f));
        let handle = announce(tracer, thread, spawned)?;
        Ok(Self { handle, thread })
    }

    /// Identifier of the child within the session, 0 when untraced.
    #[must_use]
    pub const fn thread_id(&self) -> u32 {
        self.thread
    }

    /// Waits for the thread to finish and closes it.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the thread panicked.
    pub fn join(self, tracer: &mut Tracer) -> thread::Result<T> {
        let result = self.handle.join();
        finish(tracer, self.thread, result.is_ok());
        result
    }
}

/// [`TracedThread`] spawned inside a [`thread::scope`], so the closure may
/// borrow from the caller.
#[derive(Debug)]
pub struct ScopedTracedThread<'scope, T> {
    handle: ScopedJoinHandle<'scope, T>,
    thread: u32,
}

impl<'scope, T: Send + 'scope> ScopedTracedThread<'scope, T> {
    /// Spawns `f` within `scope`; see [`TracedThread::spawn`].
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be created.
    pub fn spawn<'env, F>(
        scope: &'scope Scope<'scope, 'env>,
        tracer: &mut Tracer,
        name: Option<&str>,
        f: F,
    ) -> io::Result<Self>
    where
        F: FnOnce(&mut Tracer) -> T + Send + 'scope,
    {
        let (session, thread, builder) = prepare(tracer, name);
        let spawned = builder.spawn_scoped(scope, move || run_attached(session, thread, f));
        let handle = announce(tracer, thread, spawned)?;
        Ok(Self { handle, thread })
    }

    /// Identifier of the child within the session, 0 when untraced.
    #[must_use]
    pub const fn thread_id(&self) -> u32 {
        self.thread
    }

    /// Waits for the thread to finish and closes it.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the thread panicked.
    pub fn join(self, tracer: &mut Tracer) -> thread::Result<T> {
        let result = self.handle.join();
        finish(tracer, self.thread, result.is_ok());
        result
    }
}

fn prepare(tracer: &Tracer, name: Option<&str>) -> (Option<Arc<TraceSession>>, u32, Builder) {
    let session = tracer.session().cloned();
    let thread = session
        .as_ref()
        .map_or(0, |session| session.allocate_thread_id());
    let name = match (name, &session) {
        (Some(name), _) => name.to_owned(),
        (None, Some(session)) => format!("{}-{thread}", session.config().thread_name()),
        (None, None) => crate::config::DEFAULT_THREAD_NAME.to_owned(),
    };
    (session, thread, Builder::new().name(name))
}

fn run_attached<T>(
    session: Option<Arc<TraceSession>>,
    thread: u32,
    f: impl FnOnce(&mut Tracer) -> T,
) -> T {
    let mut tracer = session.map_or_else(Tracer::disabled, |session| {
        Tracer::attach(session, thread)
    });
    let result = f(&mut tracer);
    tracer.detach();
    result
}

fn announce<H>(tracer: &mut Tracer, thread: u32, spawned: io::Result<H>) -> io::Result<H> {
    match spawned {
        Ok(handle) => {
            tracer.thread_create(thread);
            tracer.status(CREATE, StatusCode::Ok);
            Ok(handle)
        }
        Err(error) => {
            tracing::warn!(target: "synctrace::sync", thread, %error, "thread spawn failed");
            tracer.status(CREATE, StatusCode::Thread);
            Err(error)
        }
    }
}

fn finish(tracer: &mut Tracer, thread: u32, joined: bool) {
    tracer.thread_wait(thread);
    let status = if joined {
        StatusCode::Ok
    } else {
        StatusCode::Thread
    };
    tracer.status(WAIT, status);
    tracer.thread_close(thread);
}
