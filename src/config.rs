use std::time::Duration;

/// Tunable parameters for a connection. Defaults match the fixed
/// constants this transport was designed around; congestion control is
/// explicitly out of scope, so the only variable admission control is
/// the fixed-size window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum bytes read or written per datagram, including the
    /// 20-byte header.
    pub mtu: usize,
    /// Selective-Repeat window size `W`: max unacknowledged in-flight
    /// segments.
    pub window_size: usize,
    /// Retransmission timeout.
    pub rto: Duration,
    /// How often the retransmission task wakes to scan for expired
    /// segments.
    pub retransmit_tick: Duration,
    /// How often SYN / SYN+ACK are retransmitted during the handshake.
    pub handshake_retry: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mtu: 128,
            window_size: 4,
            rto: Duration::from_secs(4),
            retransmit_tick: Duration::from_millis(100),
            handshake_retry: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Maximum payload bytes per segment: `min(64, mtu - 20)`.
    pub fn max_payload(&self) -> usize {
        (self.mtu.saturating_sub(20)).min(64)
    }
}
