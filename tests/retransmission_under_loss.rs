mod common;

use std::thread;
use std::time::{Duration, Instant};

use rudp::{RudpListener, RudpStream};

/// Drops the first data-carrying segment on the wire; the sender's
/// retransmission task should resend it once its RTO elapses, and the
/// peer should still end up with every byte.
#[test]
fn retransmission_recovers_a_dropped_segment() {
    let listener = RudpListener::bind("127.0.0.1:0", common::fast_config()).unwrap();
    let listener_addr = listener.local_addr().unwrap();

    let relay = common::spawn_lossy_relay(listener_addr, true);

    let server = thread::spawn(move || {
        let (stream, _peer) = listener.accept(Duration::from_secs(5)).unwrap();

        let mut collected = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        while collected.len() < 11 && Instant::now() < deadline {
            let chunk = stream.receive(Duration::from_millis(500)).unwrap();
            collected.extend(chunk);
        }

        stream.close().unwrap();
        collected
    });

    let client = RudpStream::connect(
        "127.0.0.1",
        relay.front_addr.port(),
        Duration::from_secs(5),
        common::fast_config(),
    )
    .unwrap();

    client.send(b"hello world").unwrap();
    client.close().unwrap();

    let received = server.join().unwrap();
    assert_eq!(received, b"hello world");
}
