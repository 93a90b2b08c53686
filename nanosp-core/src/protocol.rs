//! SP protocol and domain enumeration.
//!
//! `Protocol` identifies the messaging pattern of a socket; the numeric
//! values are the ones exchanged in the transport handshake.

use std::fmt;

use crate::error::{Result, SpError};
use crate::symbols;

/// Socket domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Full protocol semantics (filtering, load balancing, state machines)
    Sp,
    /// Raw mode for devices: headers are exposed, no state machines
    SpRaw,
}

impl Domain {
    /// Parse the numeric domain.
    pub fn from_raw(value: i32) -> Result<Self> {
        match value {
            symbols::AF_SP => Ok(Self::Sp),
            symbols::AF_SP_RAW => Ok(Self::SpRaw),
            other => Err(SpError::invalid_argument(format!("unknown domain {other}"))),
        }
    }

    /// Numeric value as reported by the `DOMAIN` option.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Sp => symbols::AF_SP,
            Self::SpRaw => symbols::AF_SP_RAW,
        }
    }

    #[must_use]
    pub const fn is_raw(self) -> bool {
        matches!(self, Self::SpRaw)
    }
}

/// SP socket protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Protocol {
    /// Exclusive bidirectional peer
    Pair = 16,
    /// Publisher
    Pub = 32,
    /// Subscriber with prefix filtering
    Sub = 33,
    /// Request side of request/reply
    Req = 48,
    /// Reply side of request/reply
    Rep = 49,
    /// Pipeline producer
    Push = 80,
    /// Pipeline consumer
    Pull = 81,
    /// Survey broadcaster
    Surveyor = 98,
    /// Survey responder
    Respondent = 99,
    /// Many-to-many mesh
    Bus = 112,
}

impl Protocol {
    /// All protocols, in numeric order.
    pub const ALL: [Self; 10] = [
        Self::Pair,
        Self::Pub,
        Self::Sub,
        Self::Req,
        Self::Rep,
        Self::Push,
        Self::Pull,
        Self::Surveyor,
        Self::Respondent,
        Self::Bus,
    ];

    /// Parse a protocol number.
    pub fn from_raw(value: i32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_raw() == value)
            .ok_or(SpError::UnsupportedProtocol(value))
    }

    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as u16 as i32
    }

    /// Get the protocol as a string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::Req => "REQ",
            Self::Rep => "REP",
            Self::Push => "PUSH",
            Self::Pull => "PULL",
            Self::Surveyor => "SURVEYOR",
            Self::Respondent => "RESPONDENT",
            Self::Bus => "BUS",
        }
    }

    /// The protocol a peer must speak to be connected to this one.
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Pair => Self::Pair,
            Self::Pub => Self::Sub,
            Self::Sub => Self::Pub,
            Self::Req => Self::Rep,
            Self::Rep => Self::Req,
            Self::Push => Self::Pull,
            Self::Pull => Self::Push,
            Self::Surveyor => Self::Respondent,
            Self::Respondent => Self::Surveyor,
            Self::Bus => Self::Bus,
        }
    }

    /// Check if this protocol is compatible with the given peer protocol.
    pub fn is_compatible(&self, peer: Protocol) -> bool {
        self.peer() == peer
    }

    /// Whether `send` is meaningful for this protocol.
    #[must_use]
    pub const fn can_send(self) -> bool {
        !matches!(self, Self::Sub | Self::Pull)
    }

    /// Whether `recv` is meaningful for this protocol.
    #[must_use]
    pub const fn can_recv(self) -> bool {
        !matches!(self, Self::Pub | Self::Push)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Pub.to_string(), "PUB");
        assert_eq!(Protocol::Surveyor.to_string(), "SURVEYOR");
    }

    #[test]
    fn test_protocol_compatibility() {
        assert!(Protocol::Req.is_compatible(Protocol::Rep));
        assert!(Protocol::Rep.is_compatible(Protocol::Req));
        assert!(Protocol::Push.is_compatible(Protocol::Pull));
        assert!(Protocol::Pub.is_compatible(Protocol::Sub));
        assert!(Protocol::Bus.is_compatible(Protocol::Bus));
        assert!(Protocol::Pair.is_compatible(Protocol::Pair));
        assert!(Protocol::Surveyor.is_compatible(Protocol::Respondent));

        // Incompatible pairs
        assert!(!Protocol::Req.is_compatible(Protocol::Req));
        assert!(!Protocol::Pub.is_compatible(Protocol::Pull));
    }

    #[test]
    fn test_raw_round_trip() {
        for p in Protocol::ALL {
            assert_eq!(Protocol::from_raw(p.as_raw()).unwrap(), p);
        }
        assert!(matches!(
            Protocol::from_raw(7),
            Err(SpError::UnsupportedProtocol(7))
        ));
    }

    #[test]
    fn test_domain() {
        assert_eq!(Domain::from_raw(1).unwrap(), Domain::Sp);
        assert!(Domain::from_raw(2).unwrap().is_raw());
        assert!(Domain::from_raw(3).is_err());
        assert_eq!(Domain::Sp.as_raw(), 1);
    }
}
