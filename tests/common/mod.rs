use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rudp::Config;

/// A config with fast timers, so the integration tests don't spend
/// real wall-clock seconds waiting on the default 4s RTO / 500ms
/// handshake retry.
pub fn fast_config() -> Config {
    Config {
        mtu: 128,
        window_size: 4,
        rto: Duration::from_millis(300),
        retransmit_tick: Duration::from_millis(50),
        handshake_retry: Duration::from_millis(100),
    }
}

/// A transparent UDP relay sitting between a client and a real
/// `RudpListener`. Forwards datagrams in both directions, rewriting
/// nothing visible to either side, but optionally drops the first
/// data-carrying segment it sees going client -> server, to exercise
/// retransmission under loss.
pub struct LossyRelay {
    pub front_addr: SocketAddr,
}

pub fn spawn_lossy_relay(upstream: SocketAddr, drop_first_data_segment: bool) -> LossyRelay {
    let front = UdpSocket::bind("127.0.0.1:0").unwrap();
    let back = UdpSocket::bind("127.0.0.1:0").unwrap();
    let front_addr = front.local_addr().unwrap();

    let client_addr: Arc<Mutex<Option<SocketAddr>>> = Arc::new(Mutex::new(None));
    let server_addr: Arc<Mutex<SocketAddr>> = Arc::new(Mutex::new(upstream));
    let dropped_once = Arc::new(AtomicBool::new(false));

    // client -> server
    {
        let front = front.try_clone().unwrap();
        let back = back.try_clone().unwrap();
        let client_addr = Arc::clone(&client_addr);
        let server_addr = Arc::clone(&server_addr);
        let dropped_once = Arc::clone(&dropped_once);
        thread::spawn(move || {
            let mut buf = [0u8; 1500];
            loop {
                let (n, from) = match front.recv_from(&mut buf) {
                    Ok(v) => v,
                    Err(_) => break,
                };
                *client_addr.lock().unwrap() = Some(from);

                if drop_first_data_segment && !dropped_once.load(Ordering::Acquire) {
                    if let Ok(seg) = rudp::Segment::decode(&buf[..n]) {
                        if seg.has_flags(rudp::ACK) && !seg.payload.is_empty() {
                            dropped_once.store(true, Ordering::Release);
                            continue;
                        }
                    }
                }

                let target = *server_addr.lock().unwrap();
                let _ = back.send_to(&buf[..n], target);
            }
        });
    }

    // server -> client
    {
        let front = front.try_clone().unwrap();
        let back = back.try_clone().unwrap();
        let client_addr = Arc::clone(&client_addr);
        let server_addr = Arc::clone(&server_addr);
        thread::spawn(move || {
            let mut buf = [0u8; 1500];
            loop {
                let (n, from) = match back.recv_from(&mut buf) {
                    Ok(v) => v,
                    Err(_) => break,
                };
                *server_addr.lock().unwrap() = from;

                if let Some(client) = *client_addr.lock().unwrap() {
                    let _ = front.send_to(&buf[..n], client);
                }
            }
        });
    }

    LossyRelay { front_addr }
}
