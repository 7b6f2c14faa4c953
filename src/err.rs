#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("segment checksum verification failed")]
    BadChecksum,

    #[error("operation requires an established connection")]
    NotConnected,

    #[error("handshake did not complete before the deadline")]
    HandshakeTimeout,

    #[error("expected flags {expected:#04x}, got {got:#04x}")]
    UnexpectedFlags { expected: u8, got: u8 },

    #[error("operation timed out")]
    Timeout,

    #[error("peer closed, or the socket was closed locally, while an operation was in flight")]
    Disconnected,

    #[error("port {0} already in use")]
    PortInUse(u16),
}
