#![cfg(unix)]

use std::thread;
use std::time::Duration;

use trace_io::{ChannelError, Transport, UnixTransport, root_channel_name, thread_channel_name};

#[test]
fn listener_and_peer_exchange_bytes_over_a_socket_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transport = UnixTransport::new(dir.path());
    let name = thread_channel_name("unix-exchange", 7);

    let traced = {
        let transport = transport.clone();
        let name = name.clone();
        thread::spawn(move || {
            let mut channel = transport.listen(&name).expect("listen");
            channel.write(&[1, 2, 3]).expect("write");
            let mut ack = [0u8; 5];
            channel.read_exact(&mut ack).expect("ack");
            channel.close().expect("close");
            ack
        })
    };

    let mut observer = transport.connect(&name).expect("connect");
    let mut record = [0u8; 3];
    observer.read_exact(&mut record).expect("record");
    assert_eq!(record, [1, 2, 3]);
    observer.write(&[0xFF, 0x0D, 0xF0, 0xAD, 0x0B]).expect("ack");

    assert_eq!(
        traced.join().expect("traced thread"),
        [0xFF, 0x0D, 0xF0, 0xAD, 0x0B]
    );
    let error = observer.read_exact(&mut [0u8; 1]).unwrap_err();
    assert!(error.is_disconnect());
    assert!(!transport.socket_path(&name).exists());
}

#[test]
fn connect_gives_up_after_the_timeout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transport = UnixTransport::new(dir.path())
        .with_connect_timeout(Duration::from_millis(30))
        .with_poll_interval(Duration::from_millis(5));
    let error = transport
        .connect(&root_channel_name("nobody"))
        .unwrap_err();
    assert!(matches!(error, ChannelError::ConnectTimeout { .. }));
}

#[test]
fn connect_waits_for_a_late_listener() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transport = UnixTransport::new(dir.path());
    let name = root_channel_name("late");

    let observer = {
        let transport = transport.clone();
        let name = name.clone();
        thread::spawn(move || {
            let mut channel = transport.connect(&name).expect("connect");
            let mut byte = [0u8; 1];
            channel.read_exact(&mut byte).expect("byte");
            byte[0]
        })
    };

    thread::sleep(Duration::from_millis(50));
    let mut root = transport.listen(&name).expect("listen");
    root.write(&[10]).expect("write");
    assert_eq!(observer.join().expect("observer"), 10);
}
