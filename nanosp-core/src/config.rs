//! Transport tuning constants.
//!
//! These values are not exposed as socket options; they size buffers and
//! polling intervals used by the transport threads.

use std::time::Duration;

/// Default read buffer size (8KB)
///
/// Tune based on expected message sizes:
/// - Small messages (< 1KB): 4096 bytes sufficient
/// - Large messages (> 8KB): 16384 or 32768 bytes
pub const DEFAULT_READ_BUF_SIZE: usize = 8192;

/// Default write buffer size (8KB)
pub const DEFAULT_WRITE_BUF_SIZE: usize = 8192;

/// How long a new connection may take to complete the protocol header exchange.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Listener threads poll their nonblocking socket at this interval so they
/// notice shutdown.
pub const DEFAULT_ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Listen backlog for TCP and IPC listeners.
pub const DEFAULT_BACKLOG: i32 = 128;

/// Transport configuration shared by every endpoint of a socket.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    /// Read buffer size
    pub read_buf_size: usize,
    /// Write buffer size
    pub write_buf_size: usize,
    pub handshake_timeout: Duration,
    pub accept_poll: Duration,
    pub backlog: i32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_buf_size: DEFAULT_READ_BUF_SIZE,
            write_buf_size: DEFAULT_WRITE_BUF_SIZE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            accept_poll: DEFAULT_ACCEPT_POLL,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.read_buf_size, 8192);
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.accept_poll, Duration::from_millis(20));
    }
}
