//! The per-connection socket: owns one UDP endpoint, drives the
//! handshake, and exposes the reliable byte-stream API.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rand::Rng;

use crate::config::Config;
use crate::segment::{Segment, ACK, FIN, FIN_ACK, SYN, SYN_ACK};
use crate::window::SendWindow;
use crate::Error;

/// Sequence-number comparison accounting for wraparound, per RFC 1323:
/// a segment is "old" if its distance behind `rhs` exceeds half the
/// sequence space.
fn wrapping_lt(lhs: u32, rhs: u32) -> bool {
    lhs.wrapping_sub(rhs) > (1 << 31)
}

fn wrapping_ge(lhs: u32, rhs: u32) -> bool {
    !wrapping_lt(lhs, rhs)
}

/// A connected, reliable byte-stream socket.
#[derive(Debug)]
pub struct RudpStream {
    socket: Arc<UdpSocket>,
    local_port: u16,
    peer: SocketAddr,
    config: Config,

    seq: AtomicU32,
    ack: AtomicU32,
    expected_seq: AtomicU32,

    window: Arc<SendWindow>,
    recv_buf: Mutex<std::collections::BTreeMap<u32, Vec<u8>>>,

    connected: Arc<AtomicBool>,
    retransmit: Mutex<Option<JoinHandle<()>>>,
}

impl RudpStream {
    pub(crate) fn from_parts(
        socket: UdpSocket,
        peer: SocketAddr,
        config: Config,
        seq: u32,
        ack: u32,
        expected_seq: u32,
    ) -> Result<Self, Error> {
        let local_port = socket.local_addr()?.port();
        Ok(RudpStream {
            socket: Arc::new(socket),
            local_port,
            peer,
            config,
            seq: AtomicU32::new(seq),
            ack: AtomicU32::new(ack),
            expected_seq: AtomicU32::new(expected_seq),
            window: Arc::new(SendWindow::new(config.window_size, seq)),
            recv_buf: Mutex::new(std::collections::BTreeMap::new()),
            connected: Arc::new(AtomicBool::new(true)),
            retransmit: Mutex::new(None),
        })
    }

    /// Actively opens a connection to `(host, port)`, performing the
    /// three-way handshake. Fails with [`Error::HandshakeTimeout`] if
    /// no SYN+ACK arrives before `deadline` elapses.
    pub fn connect(
        host: &str,
        port: u16,
        deadline: Duration,
        config: Config,
    ) -> Result<Self, Error> {
        let peer_ip = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or(Error::HandshakeTimeout)?
            .ip();
        let mut target = SocketAddr::new(peer_ip, port);

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        let local_port = socket.local_addr()?.port();

        let x: u32 = rand::thread_rng().gen();
        let syn = Segment::new(local_port, port, x, 0, SYN, Vec::new());
        socket.send_to(&syn.encode(), target)?;

        let start = Instant::now();
        let y;
        loop {
            if start.elapsed() >= deadline {
                return Err(Error::HandshakeTimeout);
            }
            let remaining = deadline.saturating_sub(start.elapsed());
            socket.set_read_timeout(Some(remaining.min(config.handshake_retry)))?;

            let mut buf = vec![0u8; config.mtu];
            match socket.recv_from(&mut buf) {
                Ok((n, from)) => match Segment::decode(&buf[..n]) {
                    Ok(seg) if seg.flags == SYN_ACK && seg.ack_num == x.wrapping_add(1) => {
                        target = from;
                        y = seg.seq_num;
                        debug!("connect: received SYN+ACK from {from}, y={y}");
                        break;
                    }
                    Ok(seg) => {
                        trace!(
                            "connect: dropping segment with unexpected flags {:#04x}",
                            seg.flags
                        );
                        continue;
                    }
                    Err(_) => {
                        warn!("connect: dropping segment with bad checksum");
                        continue;
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                    trace!("connect: retransmitting SYN");
                    socket.send_to(&syn.encode(), target)?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let seq = x.wrapping_add(1);
        let ack = y.wrapping_add(1);
        let ack_segment = Segment::new(local_port, port, seq, ack, ACK, Vec::new());
        socket.send_to(&ack_segment.encode(), target)?;

        RudpStream::from_parts(socket, target, config, seq, ack, ack)
    }

    fn ensure_retransmit_task(&self) {
        let mut slot = self.retransmit.lock().unwrap();
        if slot.is_some() {
            return;
        }

        let socket = Arc::clone(&self.socket);
        let peer = self.peer;
        let window = Arc::clone(&self.window);
        let connected = Arc::clone(&self.connected);
        let rto = self.config.rto;
        let tick = self.config.retransmit_tick;

        *slot = Some(thread::spawn(move || {
            while connected.load(Ordering::Acquire) {
                thread::sleep(tick);
                let now = Instant::now();
                for (seq, segment, first_sent) in window.unacknowledged() {
                    if now.duration_since(first_sent) >= rto {
                        match socket.send_to(&segment.encode(), peer) {
                            Ok(_) => {
                                window.refresh(seq);
                                debug!("retransmitted segment seq={seq}");
                            }
                            Err(e) => warn!("retransmit of seq={seq} failed: {e}"),
                        }
                    }
                }
            }
        }));
    }

    /// Waits up to `timeout` for one datagram from the peer, decoding
    /// and checksum-verifying it. Datagrams from any other address, or
    /// that fail to decode, are dropped and polling continues within
    /// the remaining budget. Returns `Ok(None)` on a clean timeout.
    fn poll_once(&self, timeout: Duration) -> Result<Option<Segment>, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.socket.set_read_timeout(Some(remaining))?;

            let mut buf = vec![0u8; self.config.mtu];
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    if from != self.peer {
                        debug!("dropping datagram from unexpected peer {from}");
                        continue;
                    }
                    match Segment::decode(&buf[..n]) {
                        Ok(seg) => return Ok(Some(seg)),
                        Err(_) => {
                            warn!("dropping segment with bad checksum");
                            continue;
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                    return Ok(None)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Processes one received segment: acknowledges any matching
    /// in-flight send-window entry, and if it carries a payload,
    /// buffers it (duplicates overwrite) and immediately emits an ACK.
    /// A bare FIN is answered with FIN+ACK and transitions this side to
    /// closed locally (the passive half of teardown; `close` still
    /// governs the active half and its own best-effort FIN+ACK wait).
    fn process_datagram(&self, segment: Segment) {
        if segment.has_flags(FIN) {
            let reply = Segment::new(
                self.local_port,
                self.peer.port(),
                self.seq.load(Ordering::Acquire),
                segment.seq_num.wrapping_add(1),
                FIN_ACK,
                Vec::new(),
            );
            let _ = self.socket.send_to(&reply.encode(), self.peer);
            self.connected.store(false, Ordering::Release);
            return;
        }

        if segment.has_flags(ACK) {
            self.window.acknowledge_ack_num(segment.ack_num);
        }

        if !segment.payload.is_empty() {
            let seq = segment.seq_num;
            let expected = self.expected_seq.load(Ordering::Acquire);

            if wrapping_ge(seq, expected) {
                let mut buf = self.recv_buf.lock().unwrap();
                buf.insert(seq, segment.payload.clone());
            }

            let ack_num = seq.wrapping_add(segment.payload.len() as u32);
            let reply = Segment::new(
                self.local_port,
                self.peer.port(),
                self.seq.load(Ordering::Acquire),
                ack_num,
                ACK,
                Vec::new(),
            );
            if let Err(e) = self.socket.send_to(&reply.encode(), self.peer) {
                warn!("failed to send ack: {e}");
            }
        }
    }

    /// Splices every contiguous payload starting at `expected_seq` out
    /// of the receive buffer. Advances `expected_seq` and mirrors it
    /// into `ack` on every in-order delivery.
    fn drain_contiguous(&self) -> Option<Vec<u8>> {
        let mut buf = self.recv_buf.lock().unwrap();
        let mut expected = self.expected_seq.load(Ordering::Acquire);
        let mut out = Vec::new();

        while let Some(payload) = buf.remove(&expected) {
            expected = expected.wrapping_add(payload.len() as u32);
            out.extend(payload);
        }

        if out.is_empty() {
            return None;
        }

        self.expected_seq.store(expected, Ordering::Release);
        self.ack.store(expected, Ordering::Release);
        Some(out)
    }

    /// Splits `data` into MTU-sized chunks and reliably transmits each
    /// through the send window, retransmitting under the hood until
    /// every chunk is acknowledged. Blocks until the window drains.
    pub fn send(&self, data: &[u8]) -> Result<(), Error> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(Error::NotConnected);
        }
        self.ensure_retransmit_task();

        let max_payload = self.config.max_payload().max(1);
        for chunk in data.chunks(max_payload) {
            loop {
                if !self.connected.load(Ordering::Acquire) {
                    return Err(Error::Disconnected);
                }
                if self.window.can_admit() {
                    break;
                }
                if let Some(seg) = self.poll_once(Duration::from_millis(50))? {
                    self.process_datagram(seg);
                }
            }

            let seq = self.seq.load(Ordering::Acquire);
            let ack = self.ack.load(Ordering::Acquire);
            let segment = Segment::new(self.local_port, self.peer.port(), seq, ack, ACK, chunk.to_vec());

            self.window.admit(seq, segment.clone());
            self.socket.send_to(&segment.encode(), self.peer)?;
            self.seq.fetch_add(chunk.len() as u32, Ordering::AcqRel);
        }

        while !self.window.is_empty() {
            if !self.connected.load(Ordering::Acquire) {
                return Err(Error::Disconnected);
            }
            if let Some(seg) = self.poll_once(Duration::from_millis(100))? {
                self.process_datagram(seg);
            }
        }

        Ok(())
    }

    /// Returns whatever bytes are available, in order, within
    /// `timeout`. An empty result means no data arrived in time — it
    /// is not end-of-stream.
    pub fn receive(&self, timeout: Duration) -> Result<Vec<u8>, Error> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(Error::NotConnected);
        }

        if let Some(bytes) = self.drain_contiguous() {
            return Ok(bytes);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let tick = remaining.min(Duration::from_millis(100));

            if let Some(segment) = self.poll_once(tick)? {
                self.process_datagram(segment);
                break;
            }

            if !self.connected.load(Ordering::Acquire) {
                return Err(Error::Disconnected);
            }
        }

        if !self.connected.load(Ordering::Acquire) {
            return Err(Error::Disconnected);
        }

        Ok(self.drain_contiguous().unwrap_or_default())
    }

    /// Sends FIN, waits briefly for FIN+ACK, then tears the connection
    /// down. Idempotent: a second call is a no-op.
    pub fn close(&self) -> Result<(), Error> {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let seq = self.seq.load(Ordering::Acquire);
        let ack = self.ack.load(Ordering::Acquire);
        let fin = Segment::new(self.local_port, self.peer.port(), seq, ack, FIN, Vec::new());
        if let Err(e) = self.socket.send_to(&fin.encode(), self.peer) {
            debug!("close: failed to send FIN: {e}");
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.poll_once(remaining) {
                Ok(Some(seg)) if seg.has_flags(FIN_ACK) => {
                    debug!("close: peer acknowledged FIN gracefully");
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!("close: error while waiting for FIN+ACK: {e}");
                    break;
                }
            }
        }

        if let Some(handle) = self.retransmit.lock().unwrap().take() {
            let _ = handle.join();
        }

        Ok(())
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for RudpStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
