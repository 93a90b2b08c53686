//! # nanosp protocols
//!
//! Scalability-protocol engines and the blocking socket runtime built on
//! `nanosp-core` transports.
//!
//! ## Overview
//!
//! - **PAIR**: one exclusive peer
//! - **PUB/SUB**: broadcast with prefix subscriptions
//! - **REQ/REP**: request/reply with automatic resend
//! - **PUSH/PULL**: load-balanced pipeline
//! - **SURVEYOR/RESPONDENT**: broadcast question, deadline-bounded answers
//! - **BUS**: many-to-many mesh
//!
//! Every protocol also exists in the raw domain, where headers are exposed
//! to the caller and no state machine runs. Raw sockets are what
//! [`device`] forwards between.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanosp_core::protocol::{Domain, Protocol};
//! use nanosp_core::symbols::{SUB, SUB_SUBSCRIBE};
//! use nanosp_proto::Socket;
//!
//! let publisher = Socket::open(Domain::Sp, Protocol::Pub)?;
//! publisher.bind("inproc://quotes")?;
//!
//! let subscriber = Socket::open(Domain::Sp, Protocol::Sub)?;
//! subscriber.set_option(SUB, SUB_SUBSCRIBE, "EUR")?;
//! subscriber.connect("inproc://quotes")?;
//!
//! publisher.send("EUR 1.08", 0)?;
//! let quote = subscriber.recv(0)?;
//! # Ok::<(), nanosp_core::error::SpError>(())
//! ```

#![deny(unsafe_code)]
// Allow some pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]

// Internal modules (not part of public API)
mod core;
mod engine;
mod pipes;

pub mod device;
pub mod endpoint;
pub mod header;
pub mod poll;
pub mod registry;
pub mod socket;

pub use crate::core::Readiness;
pub use device::device;
pub use endpoint::{EndpointId, EndpointInfo};
pub use poll::{poll, PollInterrupter, PollSet};
pub use registry::{SocketHandle, MAX_SOCKETS};
pub use socket::Socket;
