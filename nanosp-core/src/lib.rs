//! nanosp Core
//!
//! This crate contains the protocol-agnostic building blocks of the SP stack:
//! - Error types (`error`) and the constant table (`symbols`)
//! - Protocol and domain identifiers (`protocol`)
//! - Address parsing (`address`)
//! - Messages with ancillary data (`message`) and wire framing (`codec`)
//! - Socket options (`options`), reconnect backoff (`reconnect`), statistics (`stats`)
//! - Prefix subscriptions (`subscription`)
//! - inproc / IPC / TCP transports (`transport`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]

pub mod address;
pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod options;
pub mod protocol;
pub mod reconnect;
pub mod stats;
pub mod subscription;
pub mod symbols;
pub mod transport;

// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::address::{Address, TransportKind};
    pub use crate::error::{ErrorKind, Result, SpError};
    pub use crate::message::{Ancillary, Message};
    pub use crate::options::{OptionValue, SocketOptions};
    pub use crate::protocol::{Domain, Protocol};
    pub use crate::stats::Statistic;
}
