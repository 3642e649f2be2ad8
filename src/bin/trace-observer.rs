#![deny(unsafe_code)]

//! External observer for a traced process.
//!
//! Connects to the session's Unix sockets, acknowledges every record and
//! logs it at `info`. Exits once the traced process stops its session.

use mimalloc::MiMalloc;

/// High-performance memory allocator for improved allocation throughput.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use logging::LogConfig;

/// Observe a synchronisation-tracing session.
#[derive(Debug, Parser)]
#[command(name = "trace-observer", version, about)]
struct Args {
    /// Session identifier passed to the traced process.
    #[arg(long)]
    session: String,

    /// Directory holding the session's socket files.
    #[arg(long, value_name = "DIR")]
    socket_dir: PathBuf,

    /// Seconds to wait for the session to start listening.
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    connect_timeout: u64,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Explicit tracing filter, overriding -v and RUST_LOG.
    #[arg(long, value_name = "EXPR")]
    filter: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // records are logged at info, so that is the floor
    let mut log =
        LogConfig::from_verbose_count(args.verbose.saturating_add(1)).with_thread_names(true);
    if let Some(filter) = &args.filter {
        log = log.with_filter(filter.clone());
    }
    if let Err(error) = logging::init_tracing(&log) {
        eprintln!("trace-observer: {error}");
        return ExitCode::from(1);
    }

    run(&args)
}

#[cfg(unix)]
fn run(args: &Args) -> ExitCode {
    use std::sync::Arc;
    use std::time::Duration;

    use synctrace::observer::{Observer, ObserverConfig};
    use trace_io::{Transport, UnixTransport};

    let transport: Arc<dyn Transport> = Arc::new(
        UnixTransport::new(&args.socket_dir)
            .with_connect_timeout(Duration::from_secs(args.connect_timeout)),
    );
    let config = ObserverConfig::default().with_scheduler(|event: &synctrace::ObservedEvent| {
        tracing::info!(target: "trace_observer", "{event}");
    });

    let outcome = Observer::connect(transport, &args.session, config).and_then(Observer::join);
    match outcome {
        Ok(events) => {
            tracing::info!(
                target: "trace_observer",
                session = %args.session,
                events = events.len(),
                "session stopped"
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(
                target: "trace_observer",
                session = %args.session,
                %error,
                "observer failed"
            );
            ExitCode::from(1)
        }
    }
}

#[cfg(not(unix))]
fn run(args: &Args) -> ExitCode {
    tracing::error!(
        target: "trace_observer",
        dir = %args.socket_dir.display(),
        "unix socket transport is unavailable on this platform"
    );
    ExitCode::from(1)
}
