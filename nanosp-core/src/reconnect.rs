//! Reconnection backoff for dialing endpoints.
//!
//! A connecting endpoint waits `RECONNECT_IVL` after a failed or broken
//! connection. When `RECONNECT_IVL_MAX` is non-zero the delay doubles on
//! each consecutive failure up to that cap.

use std::time::Duration;

use crate::options::SocketOptions;

/// Reconnection state tracker for one dialing endpoint.
///
/// # Example
///
/// ```rust
/// use nanosp_core::reconnect::ReconnectState;
/// use nanosp_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let options = SocketOptions::default()
///     .with_reconnect_ivl(Duration::from_millis(100))
///     .with_reconnect_ivl_max(Duration::from_secs(10));
///
/// let mut reconnect = ReconnectState::new(&options);
///
/// // First attempt uses base interval
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
///
/// // Subsequent attempts use exponential backoff
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(200));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(400));
///
/// // Reset on successful connection
/// reconnect.reset();
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectState {
    base_interval: Duration,
    /// Zero disables backoff
    max_interval: Duration,
    attempt: u32,
    current_interval: Duration,
}

impl ReconnectState {
    /// Create a tracker from the options in effect when the endpoint was added.
    pub const fn new(options: &SocketOptions) -> Self {
        Self {
            base_interval: options.reconnect_ivl,
            max_interval: options.reconnect_ivl_max,
            attempt: 0,
            current_interval: options.reconnect_ivl,
        }
    }

    /// Get the delay for the next reconnection attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_interval;
        self.attempt = self.attempt.saturating_add(1);

        if self.max_interval > self.base_interval {
            let next = self
                .base_interval
                .checked_mul(1_u32 << self.attempt.min(16))
                .unwrap_or(self.max_interval);
            self.current_interval = next.min(self.max_interval);
        }

        delay
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_interval = self.base_interval;
    }

    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[inline]
    #[must_use]
    pub const fn current_interval(&self) -> Duration {
        self.current_interval
    }
}
