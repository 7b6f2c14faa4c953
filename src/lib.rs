//! A reliable, connection-oriented byte-stream transport layered on
//! top of `UdpSocket`: a TCP-like protocol running entirely in user
//! space. Provides segment framing with a one's-complement checksum,
//! a three-way handshake, Selective-Repeat reliable delivery, and a
//! graceful teardown, exposed as a stream-socket-shaped API
//! ([`RudpListener`] / [`RudpStream`]).
//!
//! Congestion control, path MTU discovery, TLS, and SACK bitmaps are
//! explicitly out of scope; see the design notes in the repository
//! root for the full rationale.

mod checksum;
mod config;
mod connection;
mod err;
mod listener;
mod segment;
mod window;

pub use checksum::{compute as checksum, verify as verify_checksum};
pub use config::Config;
pub use connection::RudpStream;
pub use err::Error;
pub use listener::RudpListener;
pub use segment::{Segment, ACK, FIN, FIN_ACK, SYN, SYN_ACK};
