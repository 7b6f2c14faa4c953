mod common;

use std::thread;
use std::time::Duration;

use rudp::{RudpListener, RudpStream};

#[test]
fn handshake_then_echo_round_trip() {
    let listener = RudpListener::bind("127.0.0.1:0", common::fast_config()).unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (stream, _peer) = listener.accept(Duration::from_secs(5)).unwrap();
        let received = stream.receive(Duration::from_secs(5)).unwrap();
        stream.send(&received).unwrap();
        stream.close().unwrap();
    });

    let client = RudpStream::connect(
        "127.0.0.1",
        addr.port(),
        Duration::from_secs(5),
        common::fast_config(),
    )
    .unwrap();
    assert!(client.connected());

    client.send(b"hello world").unwrap();
    let echoed = client.receive(Duration::from_secs(5)).unwrap();
    assert_eq!(echoed, b"hello world");

    client.close().unwrap();
    server.join().unwrap();
}

#[test]
fn receive_without_data_returns_empty_not_an_error() {
    let listener = RudpListener::bind("127.0.0.1:0", common::fast_config()).unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || listener.accept(Duration::from_secs(5)).unwrap());

    let client = RudpStream::connect(
        "127.0.0.1",
        addr.port(),
        Duration::from_secs(5),
        common::fast_config(),
    )
    .unwrap();

    let (server_stream, _peer) = server.join().unwrap();

    let empty = client.receive(Duration::from_millis(100)).unwrap();
    assert!(empty.is_empty());

    client.close().unwrap();
    server_stream.close().unwrap();
}

#[test]
fn operations_after_close_fail_with_not_connected() {
    let listener = RudpListener::bind("127.0.0.1:0", common::fast_config()).unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || listener.accept(Duration::from_secs(5)).unwrap());

    let client = RudpStream::connect(
        "127.0.0.1",
        addr.port(),
        Duration::from_secs(5),
        common::fast_config(),
    )
    .unwrap();
    let (server_stream, _peer) = server.join().unwrap();

    client.close().unwrap();
    assert!(!client.connected());

    assert!(matches!(client.send(b"x"), Err(rudp::Error::NotConnected)));
    assert!(matches!(
        client.receive(Duration::from_millis(10)),
        Err(rudp::Error::NotConnected)
    ));

    // close() is idempotent
    client.close().unwrap();

    server_stream.close().unwrap();
}
