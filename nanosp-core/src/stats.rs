//! Per-socket statistics counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::error::{Result, SpError};
use crate::symbols;

/// Statistic identifiers, numbered as in the constant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    EstablishedConnections,
    AcceptedConnections,
    DroppedConnections,
    BrokenConnections,
    ConnectErrors,
    BindErrors,
    AcceptErrors,
    CurrentConnections,
    InProgressConnections,
    CurrentEndpointErrors,
    MessagesSent,
    MessagesReceived,
    BytesSent,
    BytesReceived,
    CurrentSendPriority,
}

impl Statistic {
    pub const ALL: [Self; 15] = [
        Self::EstablishedConnections,
        Self::AcceptedConnections,
        Self::DroppedConnections,
        Self::BrokenConnections,
        Self::ConnectErrors,
        Self::BindErrors,
        Self::AcceptErrors,
        Self::CurrentConnections,
        Self::InProgressConnections,
        Self::CurrentEndpointErrors,
        Self::MessagesSent,
        Self::MessagesReceived,
        Self::BytesSent,
        Self::BytesReceived,
        Self::CurrentSendPriority,
    ];

    #[must_use]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::EstablishedConnections => symbols::STAT_ESTABLISHED_CONNECTIONS,
            Self::AcceptedConnections => symbols::STAT_ACCEPTED_CONNECTIONS,
            Self::DroppedConnections => symbols::STAT_DROPPED_CONNECTIONS,
            Self::BrokenConnections => symbols::STAT_BROKEN_CONNECTIONS,
            Self::ConnectErrors => symbols::STAT_CONNECT_ERRORS,
            Self::BindErrors => symbols::STAT_BIND_ERRORS,
            Self::AcceptErrors => symbols::STAT_ACCEPT_ERRORS,
            Self::CurrentConnections => symbols::STAT_CURRENT_CONNECTIONS,
            Self::InProgressConnections => symbols::STAT_INPROGRESS_CONNECTIONS,
            Self::CurrentEndpointErrors => symbols::STAT_CURRENT_EP_ERRORS,
            Self::MessagesSent => symbols::STAT_MESSAGES_SENT,
            Self::MessagesReceived => symbols::STAT_MESSAGES_RECEIVED,
            Self::BytesSent => symbols::STAT_BYTES_SENT,
            Self::BytesReceived => symbols::STAT_BYTES_RECEIVED,
            Self::CurrentSendPriority => symbols::STAT_CURRENT_SND_PRIORITY,
        }
    }

    /// Parse a statistic id; unknown ids are `NotFound`.
    pub fn from_raw(value: i32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.as_raw() == value)
            .ok_or_else(|| SpError::not_found(format!("statistic {value}")))
    }

    const fn index(self) -> usize {
        self as usize
    }

    /// Gauges go up and down; everything else only increases.
    #[must_use]
    pub const fn is_gauge(self) -> bool {
        matches!(
            self,
            Self::CurrentConnections
                | Self::InProgressConnections
                | Self::CurrentEndpointErrors
                | Self::CurrentSendPriority
        )
    }
}

/// Atomic counters for one socket.
#[derive(Debug)]
pub struct Stats {
    counters: [AtomicU64; 15],
    gauges: [AtomicI64; 15],
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            gauges: std::array::from_fn(|_| AtomicI64::new(0)),
        }
    }
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr(&self, stat: Statistic) {
        self.add(stat, 1);
    }

    #[inline]
    pub fn add(&self, stat: Statistic, n: u64) {
        if stat.is_gauge() {
            self.gauges[stat.index()].fetch_add(n as i64, Ordering::Relaxed);
        } else {
            self.counters[stat.index()].fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Decrement a gauge. Counters are never decremented.
    #[inline]
    pub fn decr(&self, stat: Statistic) {
        if stat.is_gauge() {
            self.gauges[stat.index()].fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Overwrite a gauge.
    pub fn set(&self, stat: Statistic, value: i64) {
        if stat.is_gauge() {
            self.gauges[stat.index()].store(value, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn get(&self, stat: Statistic) -> u64 {
        if stat.is_gauge() {
            self.gauges[stat.index()].load(Ordering::Relaxed).max(0) as u64
        } else {
            self.counters[stat.index()].load(Ordering::Relaxed)
        }
    }
}
