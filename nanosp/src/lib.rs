//! # nanosp
//!
//! Scalability protocols (the nanomsg family) over blocking sockets.
//!
//! ## Architecture
//!
//! - **`nanosp-core`**: framing codec, options, statistics, and the
//!   inproc/ipc/tcp transports
//! - **`nanosp-proto`**: protocol engines, socket runtime, poller, device
//! - **`nanosp`**: public API surface (this crate)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanosp::prelude::*;
//! use nanosp::symbols::{REQ, REQ_RESEND_IVL};
//!
//! let rep = Socket::open(Domain::Sp, Protocol::Rep)?;
//! rep.bind("tcp://127.0.0.1:5555")?;
//!
//! let req = Socket::open(Domain::Sp, Protocol::Req)?;
//! req.set_option(REQ, REQ_RESEND_IVL, 5_000)?;
//! req.connect("tcp://127.0.0.1:5555")?;
//!
//! req.send("ping", 0)?;
//! let request = rep.recv(0)?;
//! rep.send(request, 0)?;
//! assert_eq!(req.recv(0)?, "ping");
//! # Ok::<(), SpError>(())
//! ```
//!
//! The [`nn`] module offers the same operations over plain handles.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use bytes::Bytes;

pub use nanosp_core::address::{Address, AddressError};
pub use nanosp_core::config::TransportConfig;
pub use nanosp_core::error::{ErrorKind, Result, SpError};
pub use nanosp_core::message::{Ancillary, Message};
pub use nanosp_core::options::{OptionValue, SocketOptions};
pub use nanosp_core::protocol::{Domain, Protocol};
pub use nanosp_core::stats::Statistic;
pub use nanosp_core::symbols;
pub use nanosp_core::transport::{EndpointRole, EndpointState};
pub use nanosp_proto::{
    device, poll, EndpointId, EndpointInfo, PollInterrupter, PollSet, Readiness, Socket,
    SocketHandle, MAX_SOCKETS,
};

#[allow(missing_docs)]
pub mod nn;

/// Development helper: initialize tracing subscriber when `RUST_LOG` is set.
pub mod dev_tracing;

/// Convenient imports.
///
/// ```rust
/// use nanosp::prelude::*;
///
/// let pair = Socket::open(Domain::Sp, Protocol::Pair)?;
/// pair.close()?;
/// # Ok::<(), SpError>(())
/// ```
pub mod prelude {
    pub use super::{
        Ancillary, Bytes, Domain, ErrorKind, Message, OptionValue, Protocol, SpError, Socket,
        Statistic,
    };
}
