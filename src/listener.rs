//! The passive-open side: binds to a well-known address and performs
//! only the server half of the three-way handshake, handing each
//! accepted connection a freshly allocated per-connection endpoint.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rand::Rng;

use crate::config::Config;
use crate::connection::RudpStream;
use crate::segment::{Segment, ACK, SYN, SYN_ACK};
use crate::Error;

/// Accepts incoming connections on a bound address. Never used for
/// data once a connection has been accepted — each accepted
/// [`RudpStream`] gets its own UDP endpoint.
#[derive(Debug)]
pub struct RudpListener {
    socket: UdpSocket,
    config: Config,
}

impl RudpListener {
    pub fn bind(ip: impl ToSocketAddrs, config: Config) -> Result<Self, Error> {
        let addr = ip
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no address to bind to"))?;
        let socket = UdpSocket::bind(addr).map_err(|e| {
            if e.kind() == io::ErrorKind::AddrInUse {
                Error::PortInUse(addr.port())
            } else {
                Error::Io(e)
            }
        })?;
        Ok(RudpListener { socket, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    /// Waits for one incoming SYN and drives the server side of the
    /// handshake to completion on a freshly allocated endpoint. Fails
    /// with [`Error::HandshakeTimeout`] if no client completes the
    /// handshake before `deadline`.
    pub fn accept(&self, deadline: Duration) -> Result<(RudpStream, SocketAddr), Error> {
        let start = Instant::now();

        let (client, x) = loop {
            if start.elapsed() >= deadline {
                return Err(Error::HandshakeTimeout);
            }
            let remaining = deadline.saturating_sub(start.elapsed());
            self.socket.set_read_timeout(Some(remaining))?;

            let mut buf = vec![0u8; self.config.mtu];
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => match Segment::decode(&buf[..n]) {
                    Ok(seg) if seg.flags == SYN => {
                        debug!("accept: received SYN from {from}");
                        break (from, seg.seq_num);
                    }
                    Ok(seg) => {
                        trace!(
                            "accept: dropping segment with unexpected flags {:#04x} while waiting for SYN",
                            seg.flags
                        );
                        continue;
                    }
                    Err(_) => {
                        warn!("accept: dropping segment with bad checksum while waiting for SYN");
                        continue;
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                    return Err(Error::HandshakeTimeout)
                }
                Err(e) => return Err(e.into()),
            }
        };

        let conn_socket = UdpSocket::bind("0.0.0.0:0")?;
        let local_port = conn_socket.local_addr()?.port();

        let y: u32 = rand::thread_rng().gen();
        let synack = Segment::new(local_port, client.port(), y, x.wrapping_add(1), SYN_ACK, Vec::new());
        conn_socket.send_to(&synack.encode(), client)?;

        loop {
            if start.elapsed() >= deadline {
                return Err(Error::HandshakeTimeout);
            }
            let remaining = deadline.saturating_sub(start.elapsed());
            conn_socket.set_read_timeout(Some(remaining.min(self.config.handshake_retry)))?;

            let mut buf = vec![0u8; self.config.mtu];
            match conn_socket.recv_from(&mut buf) {
                Ok((n, from)) if from == client => match Segment::decode(&buf[..n]) {
                    Ok(seg) if seg.flags == ACK && seg.ack_num == y.wrapping_add(1) => break,
                    Ok(seg) => {
                        trace!(
                            "accept: dropping segment with unexpected flags {:#04x} while waiting for final ACK",
                            seg.flags
                        );
                        continue;
                    }
                    Err(_) => {
                        warn!("accept: dropping segment with bad checksum while waiting for final ACK");
                        continue;
                    }
                },
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                    debug!("accept: retransmitting SYN+ACK");
                    conn_socket.send_to(&synack.encode(), client)?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let seq = y.wrapping_add(1);
        let ack = x.wrapping_add(1);
        let stream = RudpStream::from_parts(conn_socket, client, self.config, seq, ack, ack)?;

        Ok((stream, client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_reports_its_local_address() {
        let listener = RudpListener::bind("127.0.0.1:0", Config::default()).unwrap();
        assert_eq!(listener.local_addr().unwrap().ip().to_string(), "127.0.0.1");
    }
}
