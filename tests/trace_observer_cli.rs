#![cfg(unix)]

use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use synctrace::sync::AutoResetEvent;
use synctrace::{TraceConfig, TraceSession, ViolationPolicy};
use trace_io::{Transport, UnixTransport};

const BIN: &str = env!("CARGO_BIN_EXE_trace-observer");

fn observer_command(session: &str, dir: &std::path::Path) -> Command {
    let mut command = Command::new(BIN);
    command
        .args(["--session", session, "--socket-dir"])
        .arg(dir)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

fn stderr_utf8(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).expect("stderr is UTF-8")
}

#[test]
fn help_lists_options() {
    let output = Command::new(BIN)
        .arg("--help")
        .output()
        .unwrap_or_else(|error| panic!("failed to run {BIN}: {error}"));
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout is UTF-8");
    assert!(stdout.contains("--session"));
    assert!(stdout.contains("--socket-dir"));
}

#[test]
fn missing_session_is_a_usage_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(BIN)
        .arg("--socket-dir")
        .arg(dir.path())
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn absent_session_times_out_with_status_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = observer_command("nobody", dir.path())
        .args(["--connect-timeout", "0"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_utf8(&output).contains("observer failed"));
}

#[test]
fn observes_a_live_session_and_exits_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let child = observer_command("cli-live", dir.path())
        .spawn()
        .expect("spawn observer");

    let transport: Arc<dyn Transport> = Arc::new(UnixTransport::new(dir.path()));
    let mut tracer = TraceSession::init(
        "cli-live",
        transport,
        TraceConfig::default().with_violation_policy(ViolationPolicy::Panic),
    );
    let event = AutoResetEvent::new(&mut tracer);
    event.set(&mut tracer);
    event.wait(&mut tracer);
    event.close(&mut tracer);
    TraceSession::stop(tracer);

    let output = child.wait_with_output().expect("observer output");
    let stderr = stderr_utf8(&output);
    assert!(output.status.success(), "observer failed: {stderr}");
    assert!(stderr.contains("Event_Create"));
    assert!(stderr.contains("Event_Close"));
    assert!(stderr.contains("session stopped"));
}
